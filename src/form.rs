use crate::match_data::MatchRow;

pub const DEFAULT_FORM_WINDOW: usize = 5;

/// Fallback table position for a team with no same-season history yet.
const NEUTRAL_POSITION: usize = 10;

/// Rolling form over a team's most recent matches, either venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormStats {
    pub points: i32,
    pub ppg: f64,
    pub goals_for: f64,
    pub goals_against: f64,
    pub goal_diff: f64,
    pub xg: f64,
    pub shots: f64,
    pub matches_played: usize,
}

impl FormStats {
    /// No-history default. Deliberately non-zero: a flat zero vector here
    /// collapses variance for every early-season team and drags model inputs
    /// toward a fictional "scores nothing, concedes nothing" team. Callers
    /// must gate on `matches_played == 0`, not on the values.
    pub fn neutral() -> Self {
        Self {
            points: 0,
            ppg: 1.0,
            goals_for: 1.2,
            goals_against: 1.2,
            goal_diff: 0.0,
            xg: 1.2,
            shots: 10.0,
            matches_played: 0,
        }
    }
}

/// Venue-restricted strength (home-only or away-only matches).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VenueStats {
    pub ppg: f64,
    pub goals_for: f64,
    pub goals_against: f64,
    pub matches_played: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TablePosition {
    pub position: usize,
    pub points: i32,
    pub goal_diff: i32,
}

impl TablePosition {
    fn neutral() -> Self {
        Self {
            position: NEUTRAL_POSITION,
            points: 0,
            goal_diff: 0,
        }
    }
}

/// Rolling form from the last `window` matches of `team_id` strictly before
/// `cutoff_unix`. `matches` must be in canonical chronological order; the scan
/// walks backwards from the cutoff so only past rows are ever touched.
pub fn team_form(
    matches: &[MatchRow],
    team_id: u32,
    cutoff_unix: i64,
    window: usize,
) -> FormStats {
    let mut points = 0i32;
    let mut goals_for = 0i32;
    let mut goals_against = 0i32;
    let mut xg = 0.0_f64;
    let mut shots = 0.0_f64;
    let mut n = 0usize;

    for m in matches.iter().rev() {
        if n >= window {
            break;
        }
        if m.date_unix >= cutoff_unix || !m.involves(team_id) {
            continue;
        }
        let is_home = m.home_team_id == team_id;
        if is_home {
            points += m.result.home_points();
            goals_for += m.home_goals;
            goals_against += m.away_goals;
            xg += m.home_xg.unwrap_or(0.0);
            shots += m.home_shots.unwrap_or(0.0);
        } else {
            points += m.result.away_points();
            goals_for += m.away_goals;
            goals_against += m.home_goals;
            xg += m.away_xg.unwrap_or(0.0);
            shots += m.away_shots.unwrap_or(0.0);
        }
        n += 1;
    }

    if n == 0 {
        return FormStats::neutral();
    }

    let nf = n as f64;
    FormStats {
        points,
        ppg: points as f64 / nf,
        goals_for: goals_for as f64 / nf,
        goals_against: goals_against as f64 / nf,
        goal_diff: (goals_for - goals_against) as f64 / nf,
        xg: xg / nf,
        shots: shots / nf,
        matches_played: n,
    }
}

/// Venue-specific rates over all of a team's prior matches on one side.
/// Empty history yields explicit zeros, unlike `team_form`: a zero here means
/// "no data" and callers are expected to read it that way.
pub fn venue_strength(
    matches: &[MatchRow],
    team_id: u32,
    cutoff_unix: i64,
    is_home: bool,
) -> VenueStats {
    let mut points = 0i32;
    let mut goals_for = 0i32;
    let mut goals_against = 0i32;
    let mut n = 0usize;

    for m in matches.iter().rev() {
        if m.date_unix >= cutoff_unix {
            continue;
        }
        let on_side = if is_home {
            m.home_team_id == team_id
        } else {
            m.away_team_id == team_id
        };
        if !on_side {
            continue;
        }
        if is_home {
            points += m.result.home_points();
            goals_for += m.home_goals;
            goals_against += m.away_goals;
        } else {
            points += m.result.away_points();
            goals_for += m.away_goals;
            goals_against += m.home_goals;
        }
        n += 1;
    }

    if n == 0 {
        return VenueStats::default();
    }

    let nf = n as f64;
    VenueStats {
        ppg: points as f64 / nf,
        goals_for: goals_for as f64 / nf,
        goals_against: goals_against as f64 / nf,
        matches_played: n,
    }
}

/// League table position rebuilt from all same-season matches strictly before
/// `cutoff_unix`. The season filter is load-bearing: dropping it leaks points
/// from other seasons into the table. Ranking is by points desc, goal diff
/// desc, team id asc — the last key makes equal-record ordering deterministic.
pub fn season_position(
    matches: &[MatchRow],
    team_id: u32,
    cutoff_unix: i64,
    season_id: u32,
) -> TablePosition {
    #[derive(Default)]
    struct Tally {
        points: i32,
        goals_for: i32,
        goals_against: i32,
    }

    let mut standings: std::collections::HashMap<u32, Tally> = std::collections::HashMap::new();

    for m in matches {
        if m.date_unix >= cutoff_unix || m.season_id != season_id {
            continue;
        }
        let home = standings.entry(m.home_team_id).or_default();
        home.points += m.result.home_points();
        home.goals_for += m.home_goals;
        home.goals_against += m.away_goals;

        let away = standings.entry(m.away_team_id).or_default();
        away.points += m.result.away_points();
        away.goals_for += m.away_goals;
        away.goals_against += m.home_goals;
    }

    let mut table: Vec<(u32, i32, i32)> = standings
        .into_iter()
        .map(|(id, t)| (id, t.points, t.goals_for - t.goals_against))
        .collect();
    table.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));

    for (rank, (id, points, goal_diff)) in table.iter().enumerate() {
        if *id == team_id {
            return TablePosition {
                position: rank + 1,
                points: *points,
                goal_diff: *goal_diff,
            };
        }
    }
    TablePosition::neutral()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::{Outcome, sort_chronologically};

    fn played(
        id: u64,
        date_unix: i64,
        home: u32,
        away: u32,
        home_goals: i32,
        away_goals: i32,
    ) -> MatchRow {
        MatchRow {
            id,
            season_id: 1,
            league_id: 1,
            date_unix,
            home_team_id: home,
            away_team_id: away,
            home_goals,
            away_goals,
            result: Outcome::from_goals(home_goals, away_goals),
            ..MatchRow::default()
        }
    }

    fn history() -> Vec<MatchRow> {
        let mut rows = vec![
            played(1, 100, 10, 20, 2, 0),
            played(2, 200, 20, 10, 1, 1),
            played(3, 300, 10, 30, 0, 1),
            played(4, 400, 30, 20, 3, 2),
            played(5, 500, 10, 20, 4, 1),
        ];
        sort_chronologically(&mut rows);
        rows
    }

    #[test]
    fn form_uses_only_matches_before_cutoff() {
        let rows = history();
        // Cutoff at match 3's kickoff: team 10 has two prior matches (W, D).
        let f = team_form(&rows, 10, 300, 5);
        assert_eq!(f.matches_played, 2);
        assert_eq!(f.points, 4);
        assert!((f.ppg - 2.0).abs() < 1e-12);
        assert!((f.goals_for - 1.5).abs() < 1e-12);
    }

    #[test]
    fn form_window_limits_history() {
        let rows = history();
        let f = team_form(&rows, 10, i64::MAX, 2);
        // Last two for team 10: loss to 30, win over 20.
        assert_eq!(f.matches_played, 2);
        assert_eq!(f.points, 3);
    }

    #[test]
    fn empty_form_is_neutral_not_zero() {
        let rows = history();
        let f = team_form(&rows, 99, i64::MAX, 5);
        assert_eq!(f.matches_played, 0);
        assert!(f.ppg > 0.0);
        assert!(f.goals_for > 0.0);
    }

    #[test]
    fn venue_strength_is_side_specific() {
        let rows = history();
        // Team 10 at home before end of time: matches 1, 3, 5 -> W L W.
        let home = venue_strength(&rows, 10, i64::MAX, true);
        assert_eq!(home.matches_played, 3);
        assert!((home.ppg - 2.0).abs() < 1e-12);
        // Team 10 away: only match 2, a draw.
        let away = venue_strength(&rows, 10, i64::MAX, false);
        assert_eq!(away.matches_played, 1);
        assert!((away.ppg - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_venue_is_explicit_zero() {
        let rows = history();
        let v = venue_strength(&rows, 99, i64::MAX, true);
        assert_eq!(v.matches_played, 0);
        assert_eq!(v.ppg, 0.0);
        assert_eq!(v.goals_for, 0.0);
    }

    #[test]
    fn season_position_ranks_by_points_then_goal_diff() {
        let rows = history();
        let p10 = season_position(&rows, 10, i64::MAX, 1);
        let p20 = season_position(&rows, 20, i64::MAX, 1);
        let p30 = season_position(&rows, 30, i64::MAX, 1);
        // Team 10: 7pts, team 30: 6pts, team 20: 1pt.
        assert_eq!(p10.position, 1);
        assert_eq!(p30.position, 2);
        assert_eq!(p20.position, 3);
        assert_eq!(p10.points, 7);
    }

    #[test]
    fn season_position_ignores_other_seasons() {
        let mut rows = history();
        let mut other = played(6, 50, 10, 20, 9, 0);
        other.season_id = 2;
        rows.push(other);
        sort_chronologically(&mut rows);
        let p = season_position(&rows, 10, i64::MAX, 1);
        // The 9-0 cross-season result must not inflate season 1 goal diff.
        assert_eq!(p.points, 7);
        assert_eq!(p.goal_diff, 4);
    }

    #[test]
    fn equal_records_break_ties_by_team_id() {
        let mut rows = vec![played(1, 100, 1, 2, 1, 1), played(2, 200, 3, 4, 2, 2)];
        sort_chronologically(&mut rows);
        // All four teams have 1 point, 0 goal diff.
        assert_eq!(season_position(&rows, 1, i64::MAX, 1).position, 1);
        assert_eq!(season_position(&rows, 2, i64::MAX, 1).position, 2);
        assert_eq!(season_position(&rows, 4, i64::MAX, 1).position, 4);
    }

    #[test]
    fn unknown_team_gets_mid_table_default() {
        let rows = history();
        let p = season_position(&rows, 99, i64::MAX, 1);
        assert_eq!(p.position, 10);
        assert_eq!(p.points, 0);
    }
}
