use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::calibrator::{CalibratedModel, Metrics, evaluate_probs};
use crate::classifier::SoftmaxClassifier;
use crate::feature_cache::{FeatureCacheStore, source_fingerprint};
use crate::features::{FEATURE_VERSION, FeatureEngine, FeatureRow, merge_rows};
use crate::match_data::{MatchRow, SeasonRow};
use crate::splitter::{self, SplitReport};
use crate::value_bets::Prediction;

const CALIBRATION_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub min_matches: usize,
    pub holdout_seasons: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            min_matches: crate::features::DEFAULT_MIN_MATCHES,
            holdout_seasons: splitter::DEFAULT_HOLDOUT_SEASONS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataStats {
    pub total_matches: usize,
    pub feature_rows: usize,
    pub skipped_insufficient: usize,
    pub served_from_cache: usize,
    pub train_rows: usize,
    pub base_rows: usize,
    pub calibration_rows: usize,
    pub test_rows: usize,
}

/// Everything a run reports, serializable for the `--report` flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainReport {
    pub data: DataStats,
    pub cache_status: String,
    pub split: SplitReport,
    /// Holdout metrics per market; empty when no test rows exist.
    pub model_performance: BTreeMap<String, Metrics>,
    /// Wall-clock seconds per pipeline stage.
    pub timings: BTreeMap<String, f64>,
}

/// The three calibrated market models a training run produces.
pub struct MarketModels {
    pub result: CalibratedModel,
    pub over_25: CalibratedModel,
    pub btts: CalibratedModel,
}

pub struct TrainOutput {
    pub models: MarketModels,
    pub report: TrainReport,
    pub test_rows: Vec<FeatureRow>,
    pub test_predictions: Vec<Prediction>,
}

impl std::fmt::Debug for TrainOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainOutput")
            .field("report", &self.report)
            .field("test_rows", &self.test_rows)
            .field("test_predictions", &self.test_predictions)
            .finish_non_exhaustive()
    }
}

/// End-to-end training: feature generation (cache-aware), per-league season
/// holdout, chronological base/calibration split inside train, one calibrated
/// model per market, evaluation on the untouched holdout. A leakage-check
/// violation is a hard error; no metrics are reported over contaminated data.
///
/// The cache is an explicit collaborator, not an ambient path: pass the same
/// store across runs to get incremental recomputation, or `None` to always
/// compute from scratch. `progress` and `cancel` are forwarded into feature
/// generation so a caller on a worker thread can watch and abort a long run.
/// Cancellation is an error, but the rows computed so far are written to the
/// cache first; the next uncancelled run resumes from them.
pub fn run_training(
    matches: Vec<MatchRow>,
    seasons: &[SeasonRow],
    config: &TrainConfig,
    cache: Option<&FeatureCacheStore>,
    progress: &mut dyn FnMut(usize, usize),
    cancel: &dyn Fn() -> bool,
) -> Result<TrainOutput> {
    let mut report = TrainReport::default();
    let t0 = Instant::now();

    let fingerprint = source_fingerprint(&matches);
    let cached = match cache {
        Some(store) => match store.load(FEATURE_VERSION, &fingerprint) {
            Ok(rows) => {
                report.cache_status = format!("hit ({} rows)", rows.len());
                rows
            }
            Err(miss) => {
                report.cache_status = format!("miss: {miss}");
                Vec::new()
            }
        },
        None => {
            report.cache_status = "disabled".to_string();
            Vec::new()
        }
    };

    let engine = FeatureEngine::new(matches);
    let skip_ids: HashSet<u64> = cached.iter().map(|r| r.match_id).collect();
    let generated = engine.generate_with(
        config.min_matches,
        (!skip_ids.is_empty()).then_some(&skip_ids),
        progress,
        cancel,
    );
    let processed =
        generated.rows.len() + generated.skipped_insufficient + generated.skipped_cached;
    let features = merge_rows(cached, generated.rows);

    if let Some(store) = cache {
        store.save(
            &features,
            FEATURE_VERSION,
            &fingerprint,
            generated.total_matches,
        )?;
    }

    if generated.cancelled {
        bail!(
            "feature generation cancelled with {processed} of {} matches processed; \
             computed rows are cached and the run is resumable",
            generated.total_matches
        );
    }

    report.data.total_matches = generated.total_matches;
    report.data.feature_rows = features.len();
    report.data.skipped_insufficient = generated.skipped_insufficient;
    report.data.served_from_cache = generated.skipped_cached;
    report
        .timings
        .insert("features".to_string(), t0.elapsed().as_secs_f64());

    if features.is_empty() {
        bail!("no feature rows generated; not enough match history");
    }

    // Holdout split and the leakage gate.
    let t1 = Instant::now();
    let split = splitter::split(&features, seasons, config.holdout_seasons);
    let leakage = splitter::verify_no_leakage(&split.train, &split.test);
    if !leakage.ok() {
        bail!(
            "temporal leakage between train and test in {} league(s); aborting",
            leakage.violations.len()
        );
    }
    report.split = split.report.clone();
    report.data.train_rows = split.train.len();
    report.data.test_rows = split.test.len();
    report
        .timings
        .insert("split".to_string(), t1.elapsed().as_secs_f64());

    // Chronological base/calibration slices inside train. Train rows arrive
    // sorted from the engine; the cut keeps calibration strictly later.
    let t2 = Instant::now();
    let train = split.train;
    if train.len() < 10 {
        bail!("only {} training rows; need at least 10", train.len());
    }
    let cut = ((train.len() as f64 * (1.0 - CALIBRATION_FRACTION)) as usize)
        .clamp(1, train.len() - 1);
    let (base, cal) = train.split_at(cut);
    report.data.base_rows = base.len();
    report.data.calibration_rows = cal.len();

    let x_base: Vec<Vec<f64>> = base.iter().map(FeatureRow::input_vector).collect();
    let x_cal: Vec<Vec<f64>> = cal.iter().map(FeatureRow::input_vector).collect();

    let mut models = MarketModels {
        result: CalibratedModel::new(Box::new(SoftmaxClassifier::new(3))),
        over_25: CalibratedModel::new(Box::new(SoftmaxClassifier::binary())),
        btts: CalibratedModel::new(Box::new(SoftmaxClassifier::binary())),
    };

    let y = |rows: &[FeatureRow], f: fn(&FeatureRow) -> usize| -> Vec<usize> {
        rows.iter().map(f).collect()
    };
    models.result.train(
        &x_base,
        &y(base, |r| r.target_result.class_index()),
        &x_cal,
        &y(cal, |r| r.target_result.class_index()),
    )?;
    models.over_25.train(
        &x_base,
        &y(base, |r| r.target_over_25 as usize),
        &x_cal,
        &y(cal, |r| r.target_over_25 as usize),
    )?;
    models.btts.train(
        &x_base,
        &y(base, |r| r.target_btts as usize),
        &x_cal,
        &y(cal, |r| r.target_btts as usize),
    )?;
    report
        .timings
        .insert("train".to_string(), t2.elapsed().as_secs_f64());

    // Holdout evaluation and per-match predictions.
    let t3 = Instant::now();
    let test_rows = split.test;
    let test_predictions = if test_rows.is_empty() {
        Vec::new()
    } else {
        let x_test: Vec<Vec<f64>> = test_rows.iter().map(FeatureRow::input_vector).collect();
        let p_result = models.result.predict_proba(&x_test)?;
        let p_over = models.over_25.predict_proba(&x_test)?;
        let p_btts = models.btts.predict_proba(&x_test)?;

        report.model_performance.insert(
            "1X2".to_string(),
            evaluate_probs(&p_result, &y(&test_rows, |r| r.target_result.class_index())),
        );
        report.model_performance.insert(
            "Over 2.5".to_string(),
            evaluate_probs(&p_over, &y(&test_rows, |r| r.target_over_25 as usize)),
        );
        report.model_performance.insert(
            "BTTS".to_string(),
            evaluate_probs(&p_btts, &y(&test_rows, |r| r.target_btts as usize)),
        );

        test_rows
            .iter()
            .enumerate()
            .map(|(i, row)| Prediction {
                match_id: row.match_id,
                prob_home: p_result[i][0],
                prob_draw: p_result[i][1],
                prob_away: p_result[i][2],
                prob_over_25: p_over[i][1],
                prob_btts: p_btts[i][1],
            })
            .collect()
    };
    report
        .timings
        .insert("evaluate".to_string(), t3.elapsed().as_secs_f64());

    Ok(TrainOutput {
        models,
        report,
        test_rows,
        test_predictions,
    })
}
