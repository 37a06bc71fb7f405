//! # Backtester
//!
//! The order simulator and everything that surrounds a run: the immutable
//! `SimulationResult` with its audit trail, and a `BatchRunner` that executes
//! independent runs in parallel.
//!
//! ## Architectural Principles
//!
//! - **Sequential in time, parallel across runs:** one group's steps always execute in
//!   order because each step starts from the previous step's state. Separate groups and
//!   separate parameter sets share nothing mutable and run on rayon's pool.
//! - **Nothing is swallowed:** every rejected order is in the fill log and every skipped
//!   decision is in the decision log, so statistics and tests can see exactly what
//!   happened.
//!
//! ## Public API
//!
//! - `OrderSimulator` / `SimulatorState`: the per-group state machine.
//! - `SimulationResult`, `StateSnapshot`, `DecisionRecord`: what a run produces.
//! - `BatchRunner`: parallel group runs, search grids and random allocation scans.
//! - `SimulationError`: the error type of this crate.

pub mod batch;
pub mod error;
pub mod result;
pub mod simulator;

pub use batch::{BatchRunner, RunSummary, ScanEntry, ScanReport};
pub use error::SimulationError;
pub use result::{DecisionOutcome, DecisionRecord, SimulationResult, SkipReason, StateSnapshot};
pub use simulator::{OrderSimulator, SimulatorState};
