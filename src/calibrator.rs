use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// The supplied-classifier capability. Gradient-boosted or otherwise, the
/// pipeline only ever sees `fit` and `predict_proba`; rows of the returned
/// probability matrix are expected to sum to ~1 across `n_classes` columns.
pub trait Classifier {
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<()>;
    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
    fn n_classes(&self) -> usize;
}

/// Monotone step map fitted with pool-adjacent-violators. Evaluation
/// interpolates linearly between block boundaries, which keeps the output a
/// non-decreasing function of the raw score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotonicMap {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl IsotonicMap {
    /// Fits scores -> targets. Targets are typically 0/1 indicators; a slice
    /// where the target never varies degenerates to a constant map, which is
    /// accepted rather than rejected (thin calibration slices do this).
    pub fn fit(scores: &[f64], targets: &[f64]) -> Self {
        if scores.is_empty() || scores.len() != targets.len() {
            return Self {
                xs: vec![0.0, 1.0],
                ys: vec![0.0, 1.0],
            };
        }

        let mut pairs: Vec<(f64, f64)> = scores
            .iter()
            .copied()
            .zip(targets.iter().copied())
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Tied scores are pooled up front; PAVA needs one weighted point per
        // distinct score or a duplicated x can shadow its neighbor's block.
        let mut grouped: Vec<(f64, f64, f64)> = Vec::with_capacity(pairs.len());
        for (x, y) in pairs {
            match grouped.last_mut() {
                Some((gx, sum, weight)) if *gx == x => {
                    *sum += y;
                    *weight += 1.0;
                }
                _ => grouped.push((x, y, 1.0)),
            }
        }

        // Pool adjacent violators: merge neighboring blocks until the block
        // means are non-decreasing.
        struct Block {
            sum: f64,
            weight: f64,
            x_min: f64,
            x_max: f64,
        }
        let mut blocks: Vec<Block> = Vec::with_capacity(grouped.len());
        for (x, sum, weight) in grouped {
            blocks.push(Block {
                sum,
                weight,
                x_min: x,
                x_max: x,
            });
            while blocks.len() >= 2 {
                let n = blocks.len();
                let prev_mean = blocks[n - 2].sum / blocks[n - 2].weight;
                let last_mean = blocks[n - 1].sum / blocks[n - 1].weight;
                if prev_mean <= last_mean {
                    break;
                }
                let last = blocks.pop().expect("non-empty");
                let prev = blocks.last_mut().expect("non-empty");
                prev.sum += last.sum;
                prev.weight += last.weight;
                prev.x_max = last.x_max;
            }
        }

        let mut xs = Vec::with_capacity(blocks.len() * 2);
        let mut ys = Vec::with_capacity(blocks.len() * 2);
        for b in &blocks {
            let mean = b.sum / b.weight;
            if xs.last().is_none_or(|last| b.x_min > *last) {
                xs.push(b.x_min);
                ys.push(mean);
            }
            if b.x_max > *xs.last().expect("pushed above") {
                xs.push(b.x_max);
                ys.push(mean);
            }
        }
        Self { xs, ys }
    }

    /// Calibrated value for a raw score; clamps outside the fitted range.
    pub fn transform(&self, score: f64) -> f64 {
        let n = self.xs.len();
        if score <= self.xs[0] {
            return self.ys[0];
        }
        if score >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        let idx = self.xs.partition_point(|x| *x <= score);
        let (x0, x1) = (self.xs[idx - 1], self.xs[idx]);
        let (y0, y1) = (self.ys[idx - 1], self.ys[idx]);
        if x1 <= x0 {
            return y1;
        }
        y0 + (y1 - y0) * (score - x0) / (x1 - x0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Untrained,
    BaseFitted,
    Calibrated,
}

/// Time-based prefit calibration: the base classifier is fitted on the
/// earliest slice only, then one isotonic map per class is fitted from the
/// base model's uncalibrated probabilities on a strictly later calibration
/// slice. No cross-validated folds — folding would mix past and future.
pub struct CalibratedModel {
    base: Box<dyn Classifier>,
    maps: Vec<IsotonicMap>,
    state: ModelState,
}

impl CalibratedModel {
    pub fn new(base: Box<dyn Classifier>) -> Self {
        Self {
            base,
            maps: Vec::new(),
            state: ModelState::Untrained,
        }
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Callers are responsible for the temporal ordering contract:
    /// every calibration row must postdate every base row.
    pub fn train(
        &mut self,
        x_base: &[Vec<f64>],
        y_base: &[usize],
        x_cal: &[Vec<f64>],
        y_cal: &[usize],
    ) -> Result<()> {
        if x_base.is_empty() || x_cal.is_empty() {
            bail!("calibrated training needs non-empty base and calibration slices");
        }
        self.base.fit(x_base, y_base).context("fit base model")?;
        self.state = ModelState::BaseFitted;

        let raw = self
            .base
            .predict_proba(x_cal)
            .context("score calibration slice")?;
        let k = self.base.n_classes();

        self.maps.clear();
        for class in 0..k {
            let scores: Vec<f64> = raw.iter().map(|row| row[class]).collect();
            let targets: Vec<f64> = y_cal
                .iter()
                .map(|y| if *y == class { 1.0 } else { 0.0 })
                .collect();
            self.maps.push(IsotonicMap::fit(&scores, &targets));
        }
        self.state = ModelState::Calibrated;
        Ok(())
    }

    /// Base probabilities pushed through each class's isotonic map, then
    /// renormalized per row (isotonic outputs carry no sum-to-one constraint).
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if self.state != ModelState::Calibrated {
            bail!("model not calibrated; call train before predict_proba");
        }
        let raw = self.base.predict_proba(x)?;
        let k = self.maps.len();
        let mut out = Vec::with_capacity(raw.len());
        for row in raw {
            let mut mapped: Vec<f64> = (0..k)
                .map(|class| self.maps[class].transform(row[class]).clamp(0.0, 1.0))
                .collect();
            let sum: f64 = mapped.iter().sum();
            if sum > 1e-12 {
                for p in &mut mapped {
                    *p /= sum;
                }
            } else {
                mapped = vec![1.0 / k as f64; k];
            }
            out.push(mapped);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub samples: usize,
    pub accuracy: f64,
    pub log_loss: f64,
    pub brier: f64,
}

/// Multiclass evaluation over probability rows against class indices.
pub fn evaluate_probs(predictions: &[Vec<f64>], actual: &[usize]) -> Metrics {
    if predictions.is_empty() || predictions.len() != actual.len() {
        return Metrics::default();
    }

    let mut correct = 0usize;
    let mut log_loss_sum = 0.0_f64;
    let mut brier_sum = 0.0_f64;

    for (row, y) in predictions.iter().zip(actual) {
        let argmax = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        if argmax == *y {
            correct += 1;
        }
        log_loss_sum += -row.get(*y).copied().unwrap_or(0.0).clamp(1e-12, 1.0).ln();
        for (class, p) in row.iter().enumerate() {
            let target = if class == *y { 1.0 } else { 0.0 };
            brier_sum += (p - target).powi(2);
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        accuracy: correct as f64 / n,
        log_loss: log_loss_sum / n,
        brier: brier_sum / n,
    }
}
