use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AnalyticsSettings, CalendarPeriod, Config, DataSettings, GapPolicy, LoggingSettings, Parallelism,
    RebalancePolicy, SearchMethod, SearchSettings, Simulation, WeightsConfig,
};
pub use telemetry::init_tracing;

/// Loads and validates the configuration from a TOML file.
///
/// Values can be overridden with `SIM_`-prefixed environment variables using `__` as the
/// section separator, e.g. `SIM_SIMULATION__FEE_RATE=0.002`.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let builder = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix("SIM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(path = %path.display(), "Configuration loaded.");
    Ok(config)
}
