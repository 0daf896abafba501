use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use betbot::dataset;
use betbot::feature_cache::FeatureCacheStore;
use betbot::pipeline::{self, TrainConfig};
use betbot::synthetic::{self, SyntheticConfig};

fn main() -> Result<()> {
    let db_path = parse_path_arg("--db");
    let use_synthetic = has_flag("--synthetic");
    let config = TrainConfig {
        min_matches: parse_usize_arg("--min-matches")
            .unwrap_or(betbot::features::DEFAULT_MIN_MATCHES)
            .max(1),
        holdout_seasons: parse_usize_arg("--holdout-seasons").unwrap_or(1).max(1),
    };
    let cache = parse_path_arg("--cache-dir").map(FeatureCacheStore::new);

    let (matches, seasons) = if use_synthetic {
        let data = synthetic::generate(&SyntheticConfig {
            seed: parse_usize_arg("--seed").map(|s| s as u64).unwrap_or(42),
            ..SyntheticConfig::default()
        });
        if let Some(path) = &db_path {
            let mut conn = dataset::open_db(path)?;
            let summary = dataset::store(&mut conn, &data.matches, &data.seasons)?;
            println!(
                "Stored synthetic data: {} matches, {} seasons -> {}",
                summary.matches_upserted,
                summary.seasons_upserted,
                path.display()
            );
        }
        (data.matches, data.seasons)
    } else {
        let path = db_path
            .ok_or_else(|| anyhow!("pass --db <path> or --synthetic to get match data"))?;
        let conn = dataset::open_db(&path)?;
        let matches = dataset::load_matches(&conn).context("load matches")?;
        let seasons = dataset::load_seasons(&conn).context("load seasons")?;
        println!(
            "Loaded {} matches across {} seasons from {}",
            matches.len(),
            seasons.len(),
            path.display()
        );
        (matches, seasons)
    };

    if matches.is_empty() {
        return Err(anyhow!("no matches available to train on"));
    }

    let out = pipeline::run_training(
        matches,
        &seasons,
        &config,
        cache.as_ref(),
        &mut |done, total| {
            if done < total {
                println!("  features {done}/{total}");
            }
        },
        &|| false,
    )?;
    let report = &out.report;

    println!();
    println!("Feature generation");
    println!("  cache: {}", report.cache_status);
    println!(
        "  {} matches -> {} feature rows ({} skipped thin history, {} from cache)",
        report.data.total_matches,
        report.data.feature_rows,
        report.data.skipped_insufficient,
        report.data.served_from_cache
    );

    println!();
    println!("Holdout split");
    for league in &report.split.leagues {
        println!(
            "  {} ({}): train {:?} | test {:?}",
            league.league_name, league.league_id, league.train_seasons, league.test_seasons
        );
        if let Some(warning) = &league.warning {
            println!("  [WARN] {warning}");
        }
    }
    if report.split.unknown_season_rows > 0 {
        println!(
            "  [WARN] {} rows with unknown season assigned to train",
            report.split.unknown_season_rows
        );
    }
    println!(
        "  train={} (base={} cal={}) test={}",
        report.data.train_rows,
        report.data.base_rows,
        report.data.calibration_rows,
        report.data.test_rows
    );

    println!();
    if report.model_performance.is_empty() {
        println!("No holdout rows; models trained but unevaluated");
    } else {
        println!("Holdout performance");
        for (market, m) in &report.model_performance {
            println!(
                "  {market}: samples={} accuracy={:.3} log_loss={:.4} brier={:.4}",
                m.samples, m.accuracy, m.log_loss, m.brier
            );
        }
    }

    println!();
    for (step, secs) in &report.timings {
        println!("  {step}: {secs:.2}s");
    }

    if let Some(path) = parse_path_arg("--report") {
        let raw = serde_json::to_string_pretty(report).context("serialize report")?;
        std::fs::write(&path, raw).with_context(|| format!("write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_value_arg(name).map(PathBuf::from)
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_value_arg(name).and_then(|raw| raw.parse::<usize>().ok())
}

fn parse_value_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
