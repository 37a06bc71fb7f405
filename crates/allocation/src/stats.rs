use crate::error::AllocationError;
use nalgebra::{DMatrix, DVector};

/// Minimum number of return observations needed for a sample covariance.
pub const MIN_OBSERVATIONS: usize = 2;

/// Per-step simple return statistics of a window of prices.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStats {
    pub mean: DVector<f64>,
    /// Sample covariance, denominator `n - 1`.
    pub cov: DMatrix<f64>,
    pub observations: usize,
}

impl ReturnStats {
    /// Estimates mean returns and their covariance from price columns, one column per
    /// asset, all of the same length.
    pub fn from_price_columns(columns: &[&[f64]]) -> Result<Self, AllocationError> {
        let assets = columns.len();
        if assets == 0 {
            return Err(AllocationError::InvalidParameters("no assets in the window".to_string()));
        }
        let rows = columns[0].len();
        if columns.iter().any(|c| c.len() != rows) {
            return Err(AllocationError::InvalidParameters(
                "price columns in the window differ in length".to_string(),
            ));
        }

        let observations = rows.saturating_sub(1);
        if observations < MIN_OBSERVATIONS {
            return Err(AllocationError::InsufficientData {
                available: observations,
                required: MIN_OBSERVATIONS,
            });
        }

        let returns = DMatrix::from_fn(observations, assets, |r, a| {
            let previous = columns[a][r];
            (columns[a][r + 1] - previous) / previous
        });

        let n = observations as f64;
        let mean = DVector::from_fn(assets, |a, _| returns.column(a).sum() / n);

        let mut cov = DMatrix::zeros(assets, assets);
        for i in 0..assets {
            for j in i..assets {
                let mut acc = 0.0;
                for r in 0..observations {
                    acc += (returns[(r, i)] - mean[i]) * (returns[(r, j)] - mean[j]);
                }
                let value = acc / (n - 1.0);
                cov[(i, j)] = value;
                cov[(j, i)] = value;
            }
        }

        Ok(Self { mean, cov, observations })
    }

    pub fn num_assets(&self) -> usize {
        self.mean.len()
    }

    /// Annualised Sharpe estimate `(w·mean * A) / sqrt(wᵗ·Cov·w * A)`.
    ///
    /// `None` when the portfolio variance is not strictly positive or the ratio is not
    /// finite.
    pub fn sharpe(&self, weights: &[f64], annualization_factor: f64) -> Option<f64> {
        let w = DVector::from_column_slice(weights);
        let expected = w.dot(&self.mean) * annualization_factor;
        let variance = w.dot(&(&self.cov * &w)) * annualization_factor;
        if !(variance > 0.0) {
            return None;
        }
        let ratio = expected / variance.sqrt();
        ratio.is_finite().then_some(ratio)
    }
}
