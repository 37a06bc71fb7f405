//! # Allocation
//!
//! Decides *when* a group rebalances and *what* it rebalances to.
//!
//! - `RebalanceSchedule`: a pure function of the step index and the timestamp index.
//! - `WeightSource`: the trait every allocation rule implements. The simulator only ever
//!   sees `Box<dyn WeightSource>`, so fixed weights, signal-driven weights and periodic
//!   Sharpe searches are interchangeable at the call site.
//! - `WeightSearch`: the pluggable optimiser behind `PeriodicSearch`, with a seeded
//!   Monte-Carlo implementation and a closed-form long-only max-Sharpe implementation.
//! - `create_weight_source`: the factory that turns the `[weights]` config into an object.

pub mod error;
pub mod factory;
pub mod schedule;
pub mod search;
pub mod source;
pub mod stats;

pub use error::AllocationError;
pub use factory::{create_weight_source, SignalInputs};
pub use schedule::RebalanceSchedule;
pub use search::{ClosedFormSearch, MonteCarloSearch, SearchOutcome, WeightSearch};
pub use source::{Allocation, DecisionContext, FixedWeights, Lookback, PeriodicSearch, SignalWeights, WeightSource};
pub use stats::ReturnStats;
