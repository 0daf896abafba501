use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};

use crate::features::FeatureRow;
use crate::match_data::SeasonRow;

pub const DEFAULT_HOLDOUT_SEASONS: usize = 1;

/// Which side of the split a season landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Train,
    Test,
}

/// Human-readable per-league audit of the split. An off-by-one in season
/// assignment silently destroys evaluation validity, so the labels on each
/// side are always reported for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueSplit {
    pub league_id: u32,
    pub league_name: String,
    pub train_seasons: Vec<String>,
    pub test_seasons: Vec<String>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitReport {
    pub leagues: Vec<LeagueSplit>,
    /// Feature rows referencing a season absent from the metadata table.
    /// They default to train; a non-zero count deserves investigation.
    pub unknown_season_rows: usize,
}

#[derive(Debug)]
pub struct SplitOutcome {
    pub train: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
    pub report: SplitReport,
}

/// Renders a season as "2024" when its matches fall inside one calendar year
/// and "2024/2025" when they cross a year boundary (the common
/// autumn-to-spring European season). Display only — split logic never
/// consults labels, only epoch timestamps.
pub fn season_label(season: &SeasonRow) -> String {
    match (season.start_date, season.end_date) {
        (Some(start), Some(end)) => {
            let start_year = year_of(start);
            let end_year = year_of(end);
            if start_year == end_year {
                format!("{start_year}")
            } else {
                format!("{start_year}/{end_year}")
            }
        }
        _ => season.year.clone(),
    }
}

fn year_of(unix: i64) -> i32 {
    DateTime::from_timestamp(unix, 0)
        .map(|dt| dt.year())
        .unwrap_or(0)
}

/// Per-league holdout: within each league, seasons are ordered by start date
/// and the most recent `holdout_seasons` go to test. Leagues with a single
/// season cannot be held out and land wholly in train with a warning.
pub fn split(
    features: &[FeatureRow],
    seasons: &[SeasonRow],
    holdout_seasons: usize,
) -> SplitOutcome {
    let holdout_seasons = holdout_seasons.max(1);

    // Group season metadata by league, keeping a deterministic league order.
    let mut by_league: BTreeMap<u32, Vec<&SeasonRow>> = BTreeMap::new();
    for season in seasons {
        by_league.entry(season.league_id).or_default().push(season);
    }

    let mut side_of: HashMap<u32, Side> = HashMap::new();
    let mut report = SplitReport::default();

    for (league_id, mut league_seasons) in by_league {
        league_seasons.sort_by_key(|s| (s.start_date.unwrap_or(i64::MAX), s.id));
        let league_name = league_seasons
            .first()
            .map(|s| s.league_name.clone())
            .unwrap_or_default();

        let mut entry = LeagueSplit {
            league_id,
            league_name,
            train_seasons: Vec::new(),
            test_seasons: Vec::new(),
            warning: None,
        };

        if league_seasons.len() < 2 {
            for season in &league_seasons {
                side_of.insert(season.id, Side::Train);
                entry.train_seasons.push(season_label(season));
            }
            entry.warning = Some(format!(
                "league {league_id} has {} season(s); cannot hold out, all assigned to train",
                league_seasons.len()
            ));
            report.leagues.push(entry);
            continue;
        }

        let holdout = holdout_seasons.min(league_seasons.len() - 1);
        let cut = league_seasons.len() - holdout;
        for (idx, season) in league_seasons.iter().enumerate() {
            let side = if idx < cut { Side::Train } else { Side::Test };
            side_of.insert(season.id, side);
            match side {
                Side::Train => entry.train_seasons.push(season_label(season)),
                Side::Test => entry.test_seasons.push(season_label(season)),
            }
        }
        report.leagues.push(entry);
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for row in features {
        match side_of.get(&row.season_id) {
            Some(Side::Train) => train.push(row.clone()),
            Some(Side::Test) => test.push(row.clone()),
            None => {
                report.unknown_season_rows += 1;
                train.push(row.clone());
            }
        }
    }

    SplitOutcome {
        train,
        test,
        report,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageViolation {
    pub league_id: u32,
    pub train_max_unix: i64,
    pub test_min_unix: i64,
}

/// Result of the single most important correctness check in the pipeline.
/// A violation means the accuracy numbers downstream are meaningless; callers
/// must fail the evaluation run rather than report them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeakageReport {
    pub violations: Vec<LeakageViolation>,
}

impl LeakageReport {
    pub fn ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Per league, asserts `max(train.date_unix) < min(test.date_unix)`.
pub fn verify_no_leakage(train: &[FeatureRow], test: &[FeatureRow]) -> LeakageReport {
    let mut train_max: HashMap<u32, i64> = HashMap::new();
    for row in train {
        let entry = train_max.entry(row.league_id).or_insert(i64::MIN);
        *entry = (*entry).max(row.date_unix);
    }

    let mut test_min: BTreeMap<u32, i64> = BTreeMap::new();
    for row in test {
        let entry = test_min.entry(row.league_id).or_insert(i64::MAX);
        *entry = (*entry).min(row.date_unix);
    }

    let mut report = LeakageReport::default();
    for (league_id, min_unix) in test_min {
        if let Some(max_unix) = train_max.get(&league_id)
            && *max_unix >= min_unix
        {
            report.violations.push(LeakageViolation {
                league_id,
                train_max_unix: *max_unix,
                test_min_unix: min_unix,
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season(id: u32, league_id: u32, start: i64, end: i64) -> SeasonRow {
        SeasonRow {
            id,
            league_id,
            league_name: format!("League {league_id}"),
            country: "Nowhere".to_string(),
            year: "?".to_string(),
            start_date: Some(start),
            end_date: Some(end),
        }
    }

    fn feature(match_id: u64, season_id: u32, league_id: u32, date_unix: i64) -> FeatureRow {
        FeatureRow {
            match_id,
            season_id,
            league_id,
            date_unix,
            ..FeatureRow::default()
        }
    }

    // 2024-08-10 and 2025-05-18.
    const AUG_2024: i64 = 1_723_248_000;
    const MAY_2025: i64 = 1_747_526_400;
    // 2024-03-01 and 2024-11-20.
    const MAR_2024: i64 = 1_709_251_200;
    const NOV_2024: i64 = 1_732_060_800;

    #[test]
    fn cross_year_season_gets_double_label() {
        let s = season(1, 1, AUG_2024, MAY_2025);
        assert_eq!(season_label(&s), "2024/2025");
    }

    #[test]
    fn single_year_season_gets_single_label() {
        let s = season(1, 1, MAR_2024, NOV_2024);
        assert_eq!(season_label(&s), "2024");
    }

    #[test]
    fn label_falls_back_to_year_field_without_dates() {
        let mut s = season(1, 1, 0, 0);
        s.start_date = None;
        s.end_date = None;
        s.year = "2023".to_string();
        assert_eq!(season_label(&s), "2023");
    }

    #[test]
    fn holdout_takes_most_recent_season_per_league() {
        let seasons = vec![
            season(10, 1, 1_000, 1_999),
            season(11, 1, 2_000, 2_999),
            season(12, 1, 3_000, 3_999),
            season(20, 2, 1_500, 2_499),
            season(21, 2, 2_500, 3_499),
        ];
        let features = vec![
            feature(1, 10, 1, 1_100),
            feature(2, 11, 1, 2_100),
            feature(3, 12, 1, 3_100),
            feature(4, 20, 2, 1_600),
            feature(5, 21, 2, 2_600),
        ];

        let out = split(&features, &seasons, 1);
        let train_ids: Vec<u64> = out.train.iter().map(|r| r.match_id).collect();
        let test_ids: Vec<u64> = out.test.iter().map(|r| r.match_id).collect();
        assert_eq!(train_ids, vec![1, 2, 4]);
        assert_eq!(test_ids, vec![3, 5]);

        let leakage = verify_no_leakage(&out.train, &out.test);
        assert!(leakage.ok());

        // Train and test season sets are disjoint per league.
        for league in &out.report.leagues {
            for label in &league.test_seasons {
                assert!(!league.train_seasons.contains(label));
            }
        }
    }

    #[test]
    fn single_season_league_goes_to_train_with_warning() {
        let seasons = vec![season(30, 3, 1_000, 1_999)];
        let features = vec![feature(1, 30, 3, 1_100)];
        let out = split(&features, &seasons, 1);
        assert_eq!(out.train.len(), 1);
        assert!(out.test.is_empty());
        assert!(out.report.leagues[0].warning.is_some());
    }

    #[test]
    fn unknown_season_rows_are_counted() {
        let seasons = vec![season(10, 1, 1_000, 1_999), season(11, 1, 2_000, 2_999)];
        let features = vec![feature(1, 99, 1, 1_100)];
        let out = split(&features, &seasons, 1);
        assert_eq!(out.report.unknown_season_rows, 1);
        assert_eq!(out.train.len(), 1);
    }

    #[test]
    fn leakage_check_flags_violations() {
        let train = vec![feature(1, 10, 1, 5_000)];
        let test = vec![feature(2, 12, 1, 4_000)];
        let report = verify_no_leakage(&train, &test);
        assert!(!report.ok());
        assert_eq!(report.violations[0].league_id, 1);

        // Other-league overlap does not cross-contaminate the check.
        let other_test = vec![feature(3, 20, 2, 1_000)];
        assert!(verify_no_leakage(&train, &other_test).ok());
    }
}
