use std::collections::HashSet;
use std::path::PathBuf;

use betbot::dataset;
use betbot::feature_cache::FeatureCacheStore;
use betbot::match_data::{MatchRow, SeasonRow};
use betbot::pipeline::{TrainConfig, TrainOutput, run_training};
use betbot::synthetic::{SyntheticConfig, generate};
use betbot::value_bets;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("betbot_e2e_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn train(matches: Vec<MatchRow>, seasons: &[SeasonRow], config: &TrainConfig) -> TrainOutput {
    train_cached(matches, seasons, config, None)
}

fn train_cached(
    matches: Vec<MatchRow>,
    seasons: &[SeasonRow],
    config: &TrainConfig,
    cache: Option<&FeatureCacheStore>,
) -> TrainOutput {
    run_training(matches, seasons, config, cache, &mut |_, _| {}, &|| false).unwrap()
}

#[test]
fn train_and_backtest_from_sqlite() {
    let dir = scratch_dir("sqlite");
    std::fs::create_dir_all(&dir).unwrap();
    let db_path = dir.join("matches.sqlite");

    let data = generate(&SyntheticConfig::default());
    let mut conn = dataset::open_db(&db_path).unwrap();
    dataset::store(&mut conn, &data.matches, &data.seasons).unwrap();

    let matches = dataset::load_matches(&conn).unwrap();
    let seasons = dataset::load_seasons(&conn).unwrap();
    assert_eq!(matches.len(), data.matches.len());

    let out = train(matches, &seasons, &TrainConfig::default());
    assert!(out.report.data.test_rows > 0);
    assert_eq!(out.test_predictions.len(), out.test_rows.len());

    // Per-league season sets never overlap across the split.
    for league in &out.report.split.leagues {
        for label in &league.test_seasons {
            assert!(!league.train_seasons.contains(label));
        }
    }

    let bets = value_bets::find_value_bets(&out.test_predictions, &out.test_rows, 0.03, 1.2, 12.0);
    let summary = value_bets::backtest(&bets, 10.0);
    if summary.total_bets > 0 {
        assert!((summary.total_staked - summary.total_bets as f64 * 10.0).abs() < 1e-9);
        assert!(summary.win_rate >= 0.0 && summary.win_rate <= 1.0);
        let per_market = value_bets::backtest_by_market(&bets, 10.0);
        let grouped: usize = per_market.values().map(|s| s.total_bets).sum();
        assert_eq!(grouped, summary.total_bets);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn warm_cache_reproduces_the_cold_run_exactly() {
    let dir = scratch_dir("cache");
    let data = generate(&SyntheticConfig {
        leagues: 1,
        seasons_per_league: 2,
        teams_per_league: 8,
        seed: 9,
    });
    let store = FeatureCacheStore::new(&dir);
    let config = TrainConfig::default();

    let cold = train_cached(data.matches.clone(), &data.seasons, &config, Some(&store));
    let warm = train_cached(data.matches.clone(), &data.seasons, &config, Some(&store));

    assert!(cold.report.cache_status.starts_with("miss"));
    assert!(warm.report.cache_status.starts_with("hit"));
    assert_eq!(warm.report.data.served_from_cache, warm.report.data.feature_rows);
    assert_eq!(warm.test_rows, cold.test_rows);

    // A historical correction invalidates the fingerprint and forces recompute.
    let mut edited = data.matches;
    edited[0].home_goals += 1;
    let changed = train_cached(edited, &data.seasons, &config, Some(&store));
    assert!(changed.report.cache_status.starts_with("miss"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn holdout_and_train_rows_are_disjoint() {
    let data = generate(&SyntheticConfig::default());
    let out = train(data.matches, &data.seasons, &TrainConfig::default());

    let test_ids: HashSet<u64> = out.test_rows.iter().map(|r| r.match_id).collect();
    assert_eq!(test_ids.len(), out.test_rows.len());
    assert_eq!(
        out.report.data.train_rows + out.report.data.test_rows,
        out.report.data.feature_rows
    );
}
