use crate::error::AllocationError;
use crate::search::{SearchOutcome, WeightSearch};
use crate::stats::ReturnStats;
use nalgebra::{DMatrix, DVector};

const TOLERANCE: f64 = 1e-12;
/// Cholesky pivots below this fraction of the largest variance count as singular.
const SINGULARITY_TOLERANCE: f64 = 1e-10;

/// Exact long-only maximum-Sharpe portfolio.
///
/// Solves `min yᵗΣy  s.t.  μᵗy = 1, y >= 0` with a primal active-set method and returns
/// `w = y / sum(y)`. On a given free set `S` the solution is
/// `y_S = Σ_S⁻¹ μ_S / (μ_Sᵗ Σ_S⁻¹ μ_S)`; assets with negative `y` leave `S`, and excluded
/// assets whose multiplier `2(Σy)_i - λ μ_i` (with `λ = 2 yᵗΣy`) is negative re-enter.
/// The result is deterministic for identical inputs.
#[derive(Debug, Clone)]
pub struct ClosedFormSearch {
    max_iterations: usize,
    annualization_factor: f64,
}

impl ClosedFormSearch {
    pub fn new(max_iterations: usize, annualization_factor: f64) -> Result<Self, AllocationError> {
        if max_iterations == 0 {
            return Err(AllocationError::InvalidParameters(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            max_iterations,
            annualization_factor,
        })
    }

    /// Solves the equality-constrained problem on the free set, returning `y` over all
    /// assets (zero outside `free`).
    fn solve_free_set(stats: &ReturnStats, free: &[usize]) -> Result<DVector<f64>, AllocationError> {
        let k = free.len();
        let sigma = DMatrix::from_fn(k, k, |r, c| stats.cov[(free[r], free[c])]);
        let mu = DVector::from_fn(k, |r, _| stats.mean[free[r]]);

        let scale = sigma.diagonal().max();
        let cholesky = sigma.cholesky().ok_or(AllocationError::SingularCovariance)?;
        let l = cholesky.l_dirty();
        if (0..k).any(|i| l[(i, i)] * l[(i, i)] <= SINGULARITY_TOLERANCE * scale) {
            return Err(AllocationError::SingularCovariance);
        }
        let z = cholesky.solve(&mu);
        let denominator = mu.dot(&z);
        if !(denominator.is_finite() && denominator > TOLERANCE) {
            return Err(AllocationError::NoFeasiblePortfolio(
                "expected excess return of the free set is not positive".to_string(),
            ));
        }

        let mut y = DVector::zeros(stats.num_assets());
        for (r, asset) in free.iter().enumerate() {
            y[*asset] = z[r] / denominator;
        }
        Ok(y)
    }
}

impl WeightSearch for ClosedFormSearch {
    fn search(&self, stats: &ReturnStats, decision_index: usize) -> Result<SearchOutcome, AllocationError> {
        let n = stats.num_assets();
        let mut free: Vec<usize> = (0..n).filter(|i| stats.mean[*i] > TOLERANCE).collect();
        if free.is_empty() {
            return Err(AllocationError::NoFeasiblePortfolio(
                "no asset has a positive mean return".to_string(),
            ));
        }

        for iteration in 0..self.max_iterations {
            let y = Self::solve_free_set(stats, &free)?;

            // Primal feasibility: drop the most negative free asset.
            let most_negative = free
                .iter()
                .copied()
                .filter(|i| y[*i] < -TOLERANCE)
                .min_by(|a, b| y[*a].total_cmp(&y[*b]));
            if let Some(asset) = most_negative {
                free.retain(|i| *i != asset);
                if free.is_empty() {
                    return Err(AllocationError::NoFeasiblePortfolio(
                        "every asset was driven out of the portfolio".to_string(),
                    ));
                }
                continue;
            }

            // Dual feasibility: re-admit the most violated excluded asset.
            let sigma_y = &stats.cov * &y;
            let lambda = 2.0 * y.dot(&sigma_y);
            let violated = (0..n)
                .filter(|i| !free.contains(i))
                .map(|i| (i, 2.0 * sigma_y[i] - lambda * stats.mean[i]))
                .filter(|(_, multiplier)| *multiplier < -TOLERANCE)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((asset, _)) = violated {
                free.push(asset);
                free.sort_unstable();
                continue;
            }

            let total: f64 = y.iter().map(|v| v.max(0.0)).sum();
            let weights: Vec<f64> = y.iter().map(|v| v.max(0.0) / total).collect();
            let sharpe = stats
                .sharpe(&weights, self.annualization_factor)
                .ok_or_else(|| AllocationError::NoFeasiblePortfolio("optimal portfolio has no risk".to_string()))?;

            tracing::debug!(decision_index, iterations = iteration + 1, sharpe, "Closed-form search converged.");
            return Ok(SearchOutcome { weights, sharpe });
        }

        Err(AllocationError::IterationLimit(self.max_iterations))
    }

    fn name(&self) -> &'static str {
        "ClosedFormSearch"
    }
}
