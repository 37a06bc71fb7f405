//! # Executor Crate
//!
//! This crate provides the components for order execution and per-group portfolio state
//! management. It defines an `Executor` trait with a `SimulatedExecutor` cost model, a
//! `PortfolioState` that tracks a group's cash and holdings, and the `CallSequencer`
//! that orders a step's trades.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** The `Executor` is a pure calculator that decides how
//!   an order fills (fees, partial fills, rejections) and returns a `Fill` without
//!   mutating anything. `PortfolioState` applies fills. Replaying a fill log therefore
//!   goes through exactly the same code path as the live simulation.
//! - **Sell Before Buy:** `CallSequencer` puts every net sell ahead of every net buy so
//!   cash freed by sells is available to buys at the same step.
//!
//! ## Public API
//!
//! - `Executor`: The trait for execution cost models.
//! - `SimulatedExecutor`: The fee and cash model used by the simulator.
//! - `PortfolioState`: The cash and positions of one cash-sharing group.
//! - `CallSequencer`: The per-step processing order of a group's orders.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod exchange;
pub mod portfolio;
pub mod sequencer;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use exchange::{Executor, SimulatedExecutor};
pub use portfolio::PortfolioState;
pub use sequencer::CallSequencer;
