//! # Market Data
//!
//! The price panel the simulator runs over, and the loaders that build it from JSON
//! files before a run starts. Nothing in this crate is touched once the simulation loop
//! is running; panels are immutable and shared read-only.

pub mod error;
pub mod loader;
pub mod panel;
pub mod signals;

pub use configuration::GapPolicy;
pub use error::DataError;
pub use loader::{load_asset_directory, load_panel_file, load_signal_file};
pub use panel::{AssetSeries, PanelFile, PricePanel, PricePoint};
pub use signals::SignalPanel;
