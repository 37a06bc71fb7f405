use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Not enough history to estimate return statistics: {available} observations, need {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("Covariance matrix is singular or not positive definite")]
    SingularCovariance,

    #[error("No feasible long-only portfolio: {0}")]
    NoFeasiblePortfolio(String),

    #[error("Search did not converge within {0} iterations")]
    IterationLimit(usize),

    #[error(transparent)]
    InvalidWeights(#[from] CoreError),

    #[error("Weight source received invalid parameters: {0}")]
    InvalidParameters(String),
}
