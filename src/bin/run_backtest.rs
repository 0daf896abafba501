use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use betbot::dataset;
use betbot::feature_cache::FeatureCacheStore;
use betbot::pipeline::{self, TrainConfig};
use betbot::synthetic::{self, SyntheticConfig};
use betbot::value_bets::{self, DEFAULT_MAX_ODDS, DEFAULT_MIN_ODDS};

const EDGE_SWEEP: &[f64] = &[0.03, 0.05, 0.08, 0.10];

fn main() -> Result<()> {
    let db_path = parse_path_arg("--db");
    let use_synthetic = has_flag("--synthetic");
    let stake = parse_f64_arg("--stake").unwrap_or(10.0).max(0.01);
    let min_odds = parse_f64_arg("--min-odds").unwrap_or(DEFAULT_MIN_ODDS);
    let max_odds = parse_f64_arg("--max-odds").unwrap_or(DEFAULT_MAX_ODDS);
    if min_odds >= max_odds {
        return Err(anyhow!("--min-odds must be below --max-odds"));
    }

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
        (data.matches, data.seasons)
    } else {
        let path = db_path
            .ok_or_else(|| anyhow!("pass --db <path> or --synthetic to get match data"))?;
        let conn = dataset::open_db(&path)?;
        (
            dataset::load_matches(&conn).context("load matches")?,
            dataset::load_seasons(&conn).context("load seasons")?,
        )
    };

    let out = pipeline::run_training(
        matches,
        &seasons,
        &config,
        cache.as_ref(),
        &mut |_, _| {},
        &|| false,
    )?;
    println!(
        "Trained on {} rows, holdout {} rows ({} leagues)",
        out.report.data.train_rows,
        out.report.data.test_rows,
        out.report.split.leagues.len()
    );
    if out.test_rows.is_empty() {
        return Err(anyhow!(
            "no holdout rows to backtest; need at least two seasons in some league"
        ));
    }

    println!();
    println!(
        "Edge sweep (stake {stake:.2}, odds {min_odds:.2}-{max_odds:.2})"
    );
    for &min_edge in EDGE_SWEEP {
        let bets = value_bets::find_value_bets(
            &out.test_predictions,
            &out.test_rows,
            min_edge,
            min_odds,
            max_odds,
        );
        let summary = value_bets::backtest(&bets, stake);
        if summary.total_bets == 0 {
            println!("  edge>={min_edge:.2}: no qualifying bets");
            continue;
        }
        println!(
            "  edge>={min_edge:.2}: bets={} wins={} win_rate={:.1}% staked={:.2} profit={:+.2} roi={:+.2}% avg_odds={:.2} avg_edge={:.3}",
            summary.total_bets,
            summary.wins,
            summary.win_rate * 100.0,
            summary.total_staked,
            summary.profit,
            summary.roi,
            summary.avg_odds,
            summary.avg_edge
        );
    }

    let min_edge = parse_f64_arg("--min-edge").unwrap_or(value_bets::DEFAULT_MIN_EDGE);
    let bets = value_bets::find_value_bets(
        &out.test_predictions,
        &out.test_rows,
        min_edge,
        min_odds,
        max_odds,
    );

    println!();
    println!("Per-market breakdown at edge>={min_edge:.2}");
    let by_market = value_bets::backtest_by_market(&bets, stake);
    if by_market.is_empty() {
        println!("  no qualifying bets");
    }
    for (market, summary) in &by_market {
        println!(
            "  {market}: bets={} wins={} roi={:+.2}% avg_odds={:.2}",
            summary.total_bets, summary.wins, summary.roi, summary.avg_odds
        );
    }

    let top = bets.iter().take(10).collect::<Vec<_>>();
    if !top.is_empty() {
        println!();
        println!("Top picks by edge");
        for bet in top {
            println!(
                "  {} vs {} | {} @ {:.2} | model {:.1}% implied {:.1}% edge {:+.3} [{:?}] kelly {:.3} -> {}",
                bet.home_team,
                bet.away_team,
                bet.market.label(),
                bet.odds,
                bet.model_prob * 100.0,
                bet.implied_prob * 100.0,
                bet.edge,
                bet.confidence,
                bet.stake_fraction,
                if bet.actual_win { "won" } else { "lost" }
            );
        }
    }

    if let Some(path) = parse_path_arg("--report") {
        let summary = value_bets::backtest(&bets, stake);
        let raw = serde_json::to_string_pretty(&serde_json::json!({
            "train": out.report,
            "min_edge": min_edge,
            "stake": stake,
            "overall": summary,
            "by_market": by_market,
        }))
        .context("serialize report")?;
        std::fs::write(&path, raw).with_context(|| format!("write {}", path.display()))?;
        println!();
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

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_value_arg(name).and_then(|raw| raw.parse::<f64>().ok())
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
