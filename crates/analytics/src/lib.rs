//! # Analytics Engine
//!
//! This crate turns the recorded output of a simulation run into performance statistics.
//! It acts as the "unbiased judge" of an allocation rule.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No knowledge of external systems. It depends only on `core-types`
//!   and the `[analytics]` settings.
//! - **Stateless Calculation:** The `AnalyticsEngine` takes an equity curve and a fill log
//!   as input and produces a `PerformanceReport` as output. It never mutates its input.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct that contains the calculation logic.
//! - `PerformanceInput`: The borrowed view of a run the engine works on.
//! - `PerformanceReport`: The standardized struct that holds the performance metrics.
//! - `RoundTrip` / `match_round_trips`: FIFO matching of fills into completed trades.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;
pub mod trades;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{drawdown_series, step_returns, AnalyticsEngine, PerformanceInput};
pub use error::AnalyticsError;
pub use report::PerformanceReport;
pub use trades::{match_round_trips, RoundTrip};
