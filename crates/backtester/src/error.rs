use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Price data error: {0}")]
    Data(#[from] market_data::DataError),

    #[error("Weight source error: {0}")]
    Allocation(#[from] allocation::AllocationError),

    #[error("Execution simulation error: {0}")]
    Executor(#[from] executor::ExecutorError),

    #[error("Analytics calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("The simulation is finalized; no further steps can be taken")]
    AlreadyFinalized,

    #[error("The simulation is not finished: {processed} of {total} steps processed")]
    NotFinalized { processed: usize, total: usize },

    #[error("Invalid simulation parameters: {0}")]
    InvalidParameters(String),

    #[error("Replaying the fill log diverged from the recorded state: {0}")]
    ReplayMismatch(String),

    #[error("Failed to build the worker pool: {0}")]
    ThreadPool(String),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),
}

impl From<indicatif::style::TemplateError> for SimulationError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        SimulationError::ProgressBarTemplate(error.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for SimulationError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        SimulationError::ThreadPool(error.to_string())
    }
}
