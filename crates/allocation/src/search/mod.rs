//! Optimisers that pick a long-only weight vector from return statistics.
//!
//! Both implementations maximise the same annualised Sharpe estimate (see
//! [`ReturnStats::sharpe`]) and return the same [`SearchOutcome`], so `PeriodicSearch`
//! can hold either behind `Box<dyn WeightSearch>`.

use crate::error::AllocationError;
use crate::stats::ReturnStats;
use std::fmt::Debug;

pub mod closed_form;
pub mod monte_carlo;

pub use closed_form::ClosedFormSearch;
pub use monte_carlo::MonteCarloSearch;

/// The weights a search settled on and their Sharpe estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub weights: Vec<f64>,
    pub sharpe: f64,
}

pub trait WeightSearch: Send + Sync + Debug {
    /// Searches long-only weights summing to one.
    ///
    /// `decision_index` identifies the decision point; randomised searches derive their
    /// stream from it so each rebalancing day draws fresh, reproducible candidates.
    fn search(&self, stats: &ReturnStats, decision_index: usize) -> Result<SearchOutcome, AllocationError>;

    /// Returns the search name for logging.
    fn name(&self) -> &'static str;
}
