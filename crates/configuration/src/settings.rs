use crate::error::ConfigError;
use core_types::{CallSequence, WeightVector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The root configuration structure for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub simulation: Simulation,
    pub rebalance: RebalancePolicy,
    pub weights: WeightsConfig,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub parallelism: Parallelism,
}

/// Contains parameters for the order simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// The starting cash of every cash-sharing group.
    pub initial_cash: f64,
    /// Fees charged on the traded value, on both sides. 0.001 corresponds to 0.1%.
    #[serde(default)]
    pub fee_rate: f64,
    #[serde(default = "default_true")]
    pub long_only: bool,
    #[serde(default = "default_true")]
    pub allow_fractional_shares: bool,
    /// Shrink buys that cannot be afforded in full instead of rejecting them.
    #[serde(default = "default_true")]
    pub partial_fills: bool,
    /// Stop making allocation decisions once a group's equity reaches zero.
    #[serde(default)]
    pub halt_on_zero_equity: bool,
    /// Tolerance for comparisons against zero.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default)]
    pub call_sequence: CallSequence,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            initial_cash: 10_000.0,
            fee_rate: 0.0,
            long_only: true,
            allow_fractional_shares: true,
            partial_fills: true,
            halt_on_zero_equity: false,
            epsilon: default_epsilon(),
            call_sequence: CallSequence::Auto,
        }
    }
}

/// When a rebalancing decision is due. The first step is always due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RebalancePolicy {
    EveryStep,
    FixedInterval { every: usize },
    Calendar { period: CalendarPeriod },
    FirstStepOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum CalendarPeriod {
    Week,
    Month,
    Quarter,
    Year,
}

/// Where target weights come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WeightsConfig {
    /// A constant vector, one weight per group asset.
    Fixed { weights: Vec<f64> },
    /// Periodic re-optimisation of the Sharpe ratio over a lookback window.
    Search(SearchSettings),
    /// Entry/exit signals read from a JSON file.
    Signals { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub method: SearchMethod,
    /// Trailing window length in steps. Zero looks back over the whole history.
    #[serde(default)]
    pub lookback: usize,
    #[serde(default = "default_num_candidates")]
    pub num_candidates: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Iteration cap for the closed-form active-set solve.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Retry a failed closed-form search with the Monte-Carlo search.
    #[serde(default)]
    pub fallback_to_monte_carlo: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            method: SearchMethod::MonteCarlo,
            lookback: 0,
            num_candidates: default_num_candidates(),
            seed: default_seed(),
            max_iterations: default_max_iterations(),
            fallback_to_monte_carlo: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SearchMethod {
    MonteCarlo,
    ClosedForm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSettings {
    /// Steps per year, e.g. 252 for daily bars.
    #[serde(default = "default_annualization_factor")]
    pub annualization_factor: u32,
    #[serde(default)]
    pub risk_free_rate_per_step: f64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            annualization_factor: default_annualization_factor(),
            risk_free_rate_per_step: 0.0,
        }
    }
}

/// How the price panel treats missing observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Any missing price is an error.
    #[default]
    Reject,
    /// Carry the last known price forward. Leading gaps are still rejected.
    ForwardFill,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSettings {
    #[serde(default)]
    pub gap_policy: GapPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parallelism {
    /// Worker threads for batch runs and candidate searches. Zero uses every core.
    #[serde(default)]
    pub threads: usize,
}

impl Config {
    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if !(sim.initial_cash.is_finite() && sim.initial_cash > 0.0) {
            return Err(ConfigError::ValidationError(
                "simulation.initial_cash must be a positive number".to_string(),
            ));
        }
        if !(sim.fee_rate.is_finite() && sim.fee_rate >= 0.0 && sim.fee_rate < 1.0) {
            return Err(ConfigError::ValidationError(
                "simulation.fee_rate must be in [0, 1)".to_string(),
            ));
        }
        if !(sim.epsilon.is_finite() && sim.epsilon >= 0.0) {
            return Err(ConfigError::ValidationError(
                "simulation.epsilon must be non-negative".to_string(),
            ));
        }

        if let RebalancePolicy::FixedInterval { every: 0 } = self.rebalance {
            return Err(ConfigError::ValidationError(
                "rebalance.every must be greater than 0".to_string(),
            ));
        }

        match &self.weights {
            WeightsConfig::Fixed { weights } => {
                WeightVector::new(weights.clone())
                    .validate(weights.len(), sim.long_only, sim.epsilon)
                    .map_err(|e| ConfigError::ValidationError(format!("weights.weights: {}", e)))?;
            }
            WeightsConfig::Search(search) => {
                if search.num_candidates == 0 {
                    return Err(ConfigError::ValidationError(
                        "weights.num_candidates must be greater than 0".to_string(),
                    ));
                }
                if search.max_iterations == 0 {
                    return Err(ConfigError::ValidationError(
                        "weights.max_iterations must be greater than 0".to_string(),
                    ));
                }
                if !sim.long_only {
                    tracing::warn!("Weight search only produces long-only weights; long_only=false has no effect on it.");
                }
            }
            WeightsConfig::Signals { .. } => {}
        }

        if self.analytics.annualization_factor == 0 {
            return Err(ConfigError::ValidationError(
                "analytics.annualization_factor must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_epsilon() -> f64 {
    1e-9
}

fn default_num_candidates() -> usize {
    2000
}

fn default_seed() -> u64 {
    42
}

fn default_max_iterations() -> usize {
    100
}

fn default_annualization_factor() -> u32 {
    252
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "simulator.log".to_string()
}
