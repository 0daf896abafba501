use anyhow::{Result, bail};

use crate::calibrator::Classifier;

const EPOCHS: usize = 300;
const LEARNING_RATE: f64 = 0.1;
const L2: f64 = 1e-3;

/// Deterministic softmax-regression baseline behind the `Classifier` trait.
/// Inputs are standardized from training statistics and the weights are fitted
/// with full-batch gradient descent, so repeated runs on the same slice
/// produce identical models. Heavier external learners plug in through the
/// same trait without touching the pipeline.
pub struct SoftmaxClassifier {
    classes: usize,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    fitted: bool,
}

impl SoftmaxClassifier {
    pub fn new(classes: usize) -> Self {
        Self {
            classes: classes.max(2),
            weights: Vec::new(),
            bias: Vec::new(),
            means: Vec::new(),
            stds: Vec::new(),
            fitted: false,
        }
    }

    pub fn binary() -> Self {
        Self::new(2)
    }

    fn standardize(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.means[j]) / self.stds[j])
            .collect()
    }

    fn scores(&self, z: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.classes);
        for c in 0..self.classes {
            let mut s = self.bias[c];
            for (w, v) in self.weights[c].iter().zip(z) {
                s += w * v;
            }
            out.push(s);
        }
        out
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let mx = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - mx).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum.max(1e-12)).collect()
}

impl Classifier for SoftmaxClassifier {
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            bail!("classifier fit needs matching non-empty X and y");
        }
        let dims = x[0].len();
        if x.iter().any(|row| row.len() != dims) {
            bail!("inconsistent feature vector width");
        }
        if let Some(bad) = y.iter().find(|label| **label >= self.classes) {
            bail!("label {bad} out of range for {} classes", self.classes);
        }

        let n = x.len() as f64;
        self.means = vec![0.0; dims];
        self.stds = vec![0.0; dims];
        for row in x {
            for (j, v) in row.iter().enumerate() {
                self.means[j] += v;
            }
        }
        for m in &mut self.means {
            *m /= n;
        }
        for row in x {
            for (j, v) in row.iter().enumerate() {
                self.stds[j] += (v - self.means[j]).powi(2);
            }
        }
        for s in &mut self.stds {
            *s = (*s / n).sqrt();
            if *s < 1e-9 {
                // Constant column: standardizes to zero instead of blowing up.
                *s = 1.0;
            }
        }

        let z: Vec<Vec<f64>> = x.iter().map(|row| self.standardize(row)).collect();
        self.weights = vec![vec![0.0; dims]; self.classes];
        self.bias = vec![0.0; self.classes];
        self.fitted = true;

        let mut grad_w = vec![vec![0.0; dims]; self.classes];
        let mut grad_b = vec![0.0; self.classes];

        for _ in 0..EPOCHS {
            for g in grad_w.iter_mut() {
                g.iter_mut().for_each(|v| *v = 0.0);
            }
            grad_b.iter_mut().for_each(|v| *v = 0.0);

            for (row, label) in z.iter().zip(y) {
                let probs = softmax(&self.scores(row));
                for c in 0..self.classes {
                    let err = probs[c] - if c == *label { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    for (g, v) in grad_w[c].iter_mut().zip(row) {
                        *g += err * v;
                    }
                }
            }

            for c in 0..self.classes {
                self.bias[c] -= LEARNING_RATE * grad_b[c] / n;
                for (w, g) in self.weights[c].iter_mut().zip(&grad_w[c]) {
                    *w -= LEARNING_RATE * (g / n + L2 * *w);
                }
            }
        }
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if !self.fitted {
            bail!("classifier not fitted");
        }
        let mut out = Vec::with_capacity(x.len());
        for row in x {
            if row.len() != self.means.len() {
                bail!(
                    "feature vector width {} != fitted width {}",
                    row.len(),
                    self.means.len()
                );
            }
            let z = self.standardize(row);
            out.push(softmax(&self.scores(&z)));
        }
        Ok(out)
    }

    fn n_classes(&self) -> usize {
        self.classes
    }
}
