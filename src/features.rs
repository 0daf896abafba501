use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::form::{self, DEFAULT_FORM_WINDOW};
use crate::head_to_head;
use crate::match_data::{MatchRow, Outcome, sort_chronologically};
use crate::value_bets::implied_prob;

/// Bump whenever the set or semantics of engineered columns changes. Any
/// cached table carrying a different version is fully invalid.
pub const FEATURE_VERSION: &str = "2";

pub const DEFAULT_MIN_MATCHES: usize = 3;
const DEFAULT_H2H_WINDOW: usize = 5;
const PROGRESS_EVERY: usize = 256;

/// Model input columns, in `input_vector` order.
pub const FEATURE_NAMES: &[&str] = &[
    "home_form_ppg",
    "home_form_goals_for",
    "home_form_goals_against",
    "home_form_goal_diff",
    "home_form_xg",
    "home_form_shots",
    "home_venue_ppg",
    "home_venue_goals_for",
    "home_venue_goals_against",
    "home_position",
    "home_season_points",
    "home_season_gd",
    "away_form_ppg",
    "away_form_goals_for",
    "away_form_goals_against",
    "away_form_goal_diff",
    "away_form_xg",
    "away_form_shots",
    "away_venue_ppg",
    "away_venue_goals_for",
    "away_venue_goals_against",
    "away_position",
    "away_season_points",
    "away_season_gd",
    "form_ppg_diff",
    "position_diff",
    "xg_diff",
    "h2h_home_wins",
    "h2h_draws",
    "h2h_away_wins",
    "h2h_total_goals",
    "implied_prob_home",
    "implied_prob_draw",
    "implied_prob_away",
    "home_prematch_ppg",
    "away_prematch_ppg",
    "prematch_ppg_diff",
    "home_xg_prematch",
    "away_xg_prematch",
    "xg_prematch_diff",
    "fs_btts_potential",
    "fs_o25_potential",
    "fs_o35_potential",
];

/// One engineered record per eligible match. Every non-`target_` field is a
/// function of matches strictly before `date_unix` or of prematch-guaranteed
/// provider columns; the match's own outcome lives only in the targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub match_id: u64,
    pub season_id: u32,
    pub league_id: u32,
    pub date_unix: i64,
    pub home_team: String,
    pub away_team: String,

    pub home_form_ppg: f64,
    pub home_form_goals_for: f64,
    pub home_form_goals_against: f64,
    pub home_form_goal_diff: f64,
    pub home_form_xg: f64,
    pub home_form_shots: f64,
    pub home_venue_ppg: f64,
    pub home_venue_goals_for: f64,
    pub home_venue_goals_against: f64,
    pub home_position: usize,
    pub home_season_points: i32,
    pub home_season_gd: i32,

    pub away_form_ppg: f64,
    pub away_form_goals_for: f64,
    pub away_form_goals_against: f64,
    pub away_form_goal_diff: f64,
    pub away_form_xg: f64,
    pub away_form_shots: f64,
    pub away_venue_ppg: f64,
    pub away_venue_goals_for: f64,
    pub away_venue_goals_against: f64,
    pub away_position: usize,
    pub away_season_points: i32,
    pub away_season_gd: i32,

    pub form_ppg_diff: f64,
    pub position_diff: i64,
    pub xg_diff: f64,

    pub h2h_home_wins: usize,
    pub h2h_draws: usize,
    pub h2h_away_wins: usize,
    pub h2h_total_goals: f64,

    pub odds_home: Option<f64>,
    pub odds_draw: Option<f64>,
    pub odds_away: Option<f64>,
    pub odds_over_25: Option<f64>,
    pub odds_btts_yes: Option<f64>,
    pub implied_prob_home: f64,
    pub implied_prob_draw: f64,
    pub implied_prob_away: f64,

    pub home_prematch_ppg: f64,
    pub away_prematch_ppg: f64,
    pub home_xg_prematch: f64,
    pub away_xg_prematch: f64,
    pub fs_btts_potential: f64,
    pub fs_o25_potential: f64,
    pub fs_o35_potential: f64,

    pub target_result: Outcome,
    pub target_home_goals: i32,
    pub target_away_goals: i32,
    pub target_total_goals: i32,
    pub target_btts: bool,
    pub target_over_25: bool,
}

impl FeatureRow {
    /// Model inputs in `FEATURE_NAMES` order.
    pub fn input_vector(&self) -> Vec<f64> {
        vec![
            self.home_form_ppg,
            self.home_form_goals_for,
            self.home_form_goals_against,
            self.home_form_goal_diff,
            self.home_form_xg,
            self.home_form_shots,
            self.home_venue_ppg,
            self.home_venue_goals_for,
            self.home_venue_goals_against,
            self.home_position as f64,
            self.home_season_points as f64,
            self.home_season_gd as f64,
            self.away_form_ppg,
            self.away_form_goals_for,
            self.away_form_goals_against,
            self.away_form_goal_diff,
            self.away_form_xg,
            self.away_form_shots,
            self.away_venue_ppg,
            self.away_venue_goals_for,
            self.away_venue_goals_against,
            self.away_position as f64,
            self.away_season_points as f64,
            self.away_season_gd as f64,
            self.form_ppg_diff,
            self.position_diff as f64,
            self.xg_diff,
            self.h2h_home_wins as f64,
            self.h2h_draws as f64,
            self.h2h_away_wins as f64,
            self.h2h_total_goals,
            self.implied_prob_home,
            self.implied_prob_draw,
            self.implied_prob_away,
            self.home_prematch_ppg,
            self.away_prematch_ppg,
            self.home_prematch_ppg - self.away_prematch_ppg,
            self.home_xg_prematch,
            self.away_xg_prematch,
            self.home_xg_prematch - self.away_xg_prematch,
            self.fs_btts_potential,
            self.fs_o25_potential,
            self.fs_o35_potential,
        ]
    }
}

/// Output of a generation run. Skip counts are always reported so that rows
/// dropped by the sufficiency gate or served from cache never vanish silently.
#[derive(Debug, Clone, Default)]
pub struct GenerateReport {
    pub rows: Vec<FeatureRow>,
    pub total_matches: usize,
    pub skipped_insufficient: usize,
    pub skipped_cached: usize,
    pub cancelled: bool,
}

pub struct FeatureEngine {
    matches: Vec<MatchRow>,
}

impl FeatureEngine {
    /// Takes ownership of the match history and sorts it once. This is the
    /// single place ordering is enforced; every calculator downstream assumes
    /// ascending `date_unix`.
    pub fn new(mut matches: Vec<MatchRow>) -> Self {
        sort_chronologically(&mut matches);
        Self { matches }
    }

    pub fn matches(&self) -> &[MatchRow] {
        &self.matches
    }

    pub fn generate(&self, min_matches: usize) -> GenerateReport {
        self.generate_with(min_matches, None, &mut |_, _| {}, &|| false)
    }

    /// Full-control generation entry point.
    ///
    /// `skip_ids`: match ids already present in a valid cache; they are
    /// counted but not recomputed. `progress` is a cheap side-effecting
    /// callback invoked every few hundred rows and once more at the end of a
    /// completed run; a cancelled run never reports `(total, total)`.
    /// `cancel` is polled once per match; when it turns true the rows
    /// produced so far are returned intact with `cancelled` set, so a partial
    /// run stays resumable through the cache.
    pub fn generate_with(
        &self,
        min_matches: usize,
        skip_ids: Option<&HashSet<u64>>,
        progress: &mut dyn FnMut(usize, usize),
        cancel: &dyn Fn() -> bool,
    ) -> GenerateReport {
        let total = self.matches.len();
        let mut report = GenerateReport {
            total_matches: total,
            ..GenerateReport::default()
        };

        for (idx, m) in self.matches.iter().enumerate() {
            if cancel() {
                report.cancelled = true;
                break;
            }
            if idx % PROGRESS_EVERY == 0 {
                progress(idx, total);
            }
            if skip_ids.is_some_and(|ids| ids.contains(&m.id)) {
                report.skipped_cached += 1;
                continue;
            }
            match self.build_row(m, min_matches) {
                Some(row) => report.rows.push(row),
                None => report.skipped_insufficient += 1,
            }
        }

        if !report.cancelled {
            progress(total, total);
        }
        report
    }

    fn build_row(&self, m: &MatchRow, min_matches: usize) -> Option<FeatureRow> {
        let cutoff = m.date_unix;
        let home_form = form::team_form(&self.matches, m.home_team_id, cutoff, DEFAULT_FORM_WINDOW);
        let away_form = form::team_form(&self.matches, m.away_team_id, cutoff, DEFAULT_FORM_WINDOW);

        // Sufficiency gate: early-season rows with thin history are high
        // variance and are skipped entirely rather than filled with defaults.
        if home_form.matches_played < min_matches || away_form.matches_played < min_matches {
            return None;
        }

        let home_venue = form::venue_strength(&self.matches, m.home_team_id, cutoff, true);
        let away_venue = form::venue_strength(&self.matches, m.away_team_id, cutoff, false);
        let h2h = head_to_head::h2h(
            &self.matches,
            m.home_team_id,
            m.away_team_id,
            cutoff,
            DEFAULT_H2H_WINDOW,
        );
        let home_pos = form::season_position(&self.matches, m.home_team_id, cutoff, m.season_id);
        let away_pos = form::season_position(&self.matches, m.away_team_id, cutoff, m.season_id);

        Some(FeatureRow {
            match_id: m.id,
            season_id: m.season_id,
            league_id: m.league_id,
            date_unix: m.date_unix,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),

            home_form_ppg: home_form.ppg,
            home_form_goals_for: home_form.goals_for,
            home_form_goals_against: home_form.goals_against,
            home_form_goal_diff: home_form.goal_diff,
            home_form_xg: home_form.xg,
            home_form_shots: home_form.shots,
            home_venue_ppg: home_venue.ppg,
            home_venue_goals_for: home_venue.goals_for,
            home_venue_goals_against: home_venue.goals_against,
            home_position: home_pos.position,
            home_season_points: home_pos.points,
            home_season_gd: home_pos.goal_diff,

            away_form_ppg: away_form.ppg,
            away_form_goals_for: away_form.goals_for,
            away_form_goals_against: away_form.goals_against,
            away_form_goal_diff: away_form.goal_diff,
            away_form_xg: away_form.xg,
            away_form_shots: away_form.shots,
            away_venue_ppg: away_venue.ppg,
            away_venue_goals_for: away_venue.goals_for,
            away_venue_goals_against: away_venue.goals_against,
            away_position: away_pos.position,
            away_season_points: away_pos.points,
            away_season_gd: away_pos.goal_diff,

            form_ppg_diff: home_form.ppg - away_form.ppg,
            // Positive means the home side sits higher in the table.
            position_diff: away_pos.position as i64 - home_pos.position as i64,
            xg_diff: home_form.xg - away_form.xg,

            h2h_home_wins: h2h.wins,
            h2h_draws: h2h.draws,
            h2h_away_wins: h2h.losses,
            h2h_total_goals: h2h.goals_for + h2h.goals_against,

            odds_home: m.odds_home,
            odds_draw: m.odds_draw,
            odds_away: m.odds_away,
            odds_over_25: m.odds_over_25,
            odds_btts_yes: m.odds_btts_yes,
            implied_prob_home: implied_prob(m.odds_home.unwrap_or(0.0)),
            implied_prob_draw: implied_prob(m.odds_draw.unwrap_or(0.0)),
            implied_prob_away: implied_prob(m.odds_away.unwrap_or(0.0)),

            home_prematch_ppg: m.home_ppg.unwrap_or(0.0),
            away_prematch_ppg: m.away_ppg.unwrap_or(0.0),
            home_xg_prematch: m.home_xg_prematch.unwrap_or(0.0),
            away_xg_prematch: m.away_xg_prematch.unwrap_or(0.0),
            fs_btts_potential: m.fs_btts_potential.unwrap_or(0.0),
            fs_o25_potential: m.fs_o25_potential.unwrap_or(0.0),
            fs_o35_potential: m.fs_o35_potential.unwrap_or(0.0),

            target_result: m.result,
            target_home_goals: m.home_goals,
            target_away_goals: m.away_goals,
            target_total_goals: m.total_goals(),
            target_btts: m.btts(),
            target_over_25: m.over_25(),
        })
    }
}

/// Union of cached and freshly computed rows, de-duplicated by match id with
/// the fresh row winning, returned in chronological order.
pub fn merge_rows(cached: Vec<FeatureRow>, fresh: Vec<FeatureRow>) -> Vec<FeatureRow> {
    let fresh_ids: HashSet<u64> = fresh.iter().map(|r| r.match_id).collect();
    let mut out: Vec<FeatureRow> = cached
        .into_iter()
        .filter(|r| !fresh_ids.contains(&r.match_id))
        .collect();
    out.extend(fresh);
    out.sort_by_key(|r| (r.date_unix, r.match_id));
    out
}
