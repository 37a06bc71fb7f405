//! # Core Types
//!
//! The shared vocabulary of the simulator. Every other crate in the workspace speaks in
//! terms of these types: asset groups, weight vectors, orders and fills.
//!
//! This crate sits at the bottom of the dependency graph and has no knowledge of
//! configuration, prices or execution.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{CallSequence, OrderSide};
pub use error::CoreError;
pub use structs::{AssetGroup, Fill, FillStatus, Order, OrderSize, RejectReason, WeightVector};
