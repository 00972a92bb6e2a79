//! Model capability surface and the logistic regression implementation
//!
//! The pipeline only needs three things from a model type: fit it on feature
//! rows and binary labels, predict labels, and turn it into bytes and back so
//! it can live in the artifact store. [`Trainer`] bundles those; the pipeline
//! components are generic over it.

use crate::dataset::{FeatureRow, FEATURE_COLUMNS};
use chrono::{DateTime, Utc};
use dra_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A fitted binary classifier
pub trait Classifier {
    /// One 0/1 label per input row
    fn predict(&self, features: &[FeatureRow]) -> Vec<u8>;
}

/// Fits and (de)serializes one kind of classifier
pub trait Trainer: Send + Sync {
    type Model: Classifier;

    fn train(&self, features: &[FeatureRow], target: &[u8]) -> Result<Self::Model>;

    fn encode(&self, model: &Self::Model) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Model>;
}

// ============================================================================
// Logistic regression
// ============================================================================

/// Fitting parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticRegressionParams {
    /// Inverse L2 regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Convergence threshold on the largest Newton step component
    pub tol: f64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
        }
    }
}

/// Fitted binary logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub feature_names: Vec<String>,
    pub weights: [f64; 3],
    pub intercept: f64,
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub iterations: usize,
    pub converged: bool,
}

impl LogisticRegression {
    /// Linear score; positive means class 1
    pub fn decision(&self, row: &FeatureRow) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(row.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    /// Probability of class 1
    pub fn probability(&self, row: &FeatureRow) -> f64 {
        sigmoid(self.decision(row))
    }
}

impl Classifier for LogisticRegression {
    fn predict(&self, features: &[FeatureRow]) -> Vec<u8> {
        features
            .iter()
            .map(|row| u8::from(self.decision(row) > 0.0))
            .collect()
    }
}

/// Newton-method trainer for [`LogisticRegression`]
#[derive(Debug, Clone, Default)]
pub struct LogisticRegressionTrainer {
    params: LogisticRegressionParams,
}

impl LogisticRegressionTrainer {
    pub fn new(params: LogisticRegressionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LogisticRegressionParams {
        &self.params
    }
}

impl Trainer for LogisticRegressionTrainer {
    type Model = LogisticRegression;

    /// Minimizes `0.5 * |w|^2 + C * sum(log_loss)`; the intercept is not
    /// penalized.
    fn train(&self, features: &[FeatureRow], target: &[u8]) -> Result<LogisticRegression> {
        if features.is_empty() {
            return Err(Error::InvalidInput("cannot train on an empty dataset".to_string()));
        }
        if features.len() != target.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} labels",
                features.len(),
                target.len()
            )));
        }
        if let Some(bad) = target.iter().find(|&&y| y > 1) {
            return Err(Error::InvalidInput(format!("label {} is not binary", bad)));
        }
        if let Some(row) = features.iter().find(|r| r.iter().any(|v| !v.is_finite())) {
            return Err(Error::InvalidInput(format!("non-finite feature row {:?}", row)));
        }
        let positives = target.iter().filter(|&&y| y == 1).count();
        if positives == 0 || positives == target.len() {
            return Err(Error::InvalidInput(format!(
                "training needs both classes, got only {}",
                u8::from(positives > 0)
            )));
        }

        let c = self.params.c;
        // theta = [w0, w1, w2, b]
        let mut theta = [0.0f64; 4];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.params.max_iter {
            iterations += 1;

            let mut grad = [0.0f64; 4];
            let mut hess = [[0.0f64; 4]; 4];
            for k in 0..3 {
                grad[k] = theta[k];
                hess[k][k] = 1.0;
            }

            for (row, &y) in features.iter().zip(target.iter()) {
                let x = [row[0], row[1], row[2], 1.0];
                let z: f64 = x.iter().zip(theta.iter()).map(|(a, b)| a * b).sum();
                let p = sigmoid(z);
                let r = c * (p - f64::from(y));
                let s = c * p * (1.0 - p);
                for i in 0..4 {
                    grad[i] += r * x[i];
                    for j in 0..4 {
                        hess[i][j] += s * x[i] * x[j];
                    }
                }
            }
            // Keeps the system solvable when every prediction saturates
            hess[3][3] += 1e-10;

            let step = solve4(hess, grad).ok_or_else(|| {
                Error::Internal("logistic regression Hessian is singular".to_string())
            })?;
            for i in 0..4 {
                theta[i] -= step[i];
            }

            let largest = step.iter().fold(0.0f64, |m, s| m.max(s.abs()));
            debug!(iteration = iterations, step = largest, "Newton step");
            if largest < self.params.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(max_iter = self.params.max_iter, "Logistic regression did not converge");
        }

        let model = LogisticRegression {
            feature_names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            weights: [theta[0], theta[1], theta[2]],
            intercept: theta[3],
            trained_at: Utc::now(),
            n_samples: features.len(),
            iterations,
            converged,
        };
        info!(
            samples = model.n_samples,
            iterations,
            converged,
            "Training of logistic regression model complete"
        );
        Ok(model)
    }

    fn encode(&self, model: &LogisticRegression) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(model)
            .map_err(|e| Error::Internal(format!("model serialization failed: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<LogisticRegression> {
        let model: LogisticRegression = serde_json::from_slice(bytes)
            .map_err(|e| Error::Consistency(format!("model artifact unreadable: {}", e)))?;
        if model.feature_names != FEATURE_COLUMNS {
            return Err(Error::Schema(format!(
                "model expects features [{}]",
                model.feature_names.join(", ")
            )));
        }
        Ok(model)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting
fn solve4(mut a: [[f64; 4]; 4], mut b: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot = (col..4).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..4 {
            let factor = a[row][col] / a[col][col];
            for k in col..4 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; 4];
    for row in (0..4).rev() {
        let tail: f64 = (row + 1..4).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
