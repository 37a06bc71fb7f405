use crate::error::AllocationError;
use crate::search::{ClosedFormSearch, MonteCarloSearch, WeightSearch};
use crate::source::{FixedWeights, Lookback, PeriodicSearch, SignalWeights, WeightSource};
use configuration::{AnalyticsSettings, SearchMethod, SearchSettings, WeightsConfig};
use core_types::WeightVector;

/// Entry/exit columns for a signal-driven source, one column per group asset in group
/// order. Loading them is the caller's job; the factory only wires them in.
#[derive(Debug, Clone, Default)]
pub struct SignalInputs {
    pub entries: Vec<Vec<bool>>,
    pub exits: Vec<Vec<bool>>,
}

/// Creates the weight source described by the `[weights]` config section.
///
/// `group_len` is the number of assets in the group the source will serve.
pub fn create_weight_source(
    config: &WeightsConfig,
    analytics: &AnalyticsSettings,
    group_len: usize,
    signals: Option<SignalInputs>,
) -> Result<Box<dyn WeightSource>, AllocationError> {
    match config {
        WeightsConfig::Fixed { weights } => {
            if weights.len() != group_len {
                return Err(AllocationError::InvalidParameters(format!(
                    "{} fixed weights configured for a group of {} assets",
                    weights.len(),
                    group_len
                )));
            }
            Ok(Box::new(FixedWeights::new(WeightVector::new(weights.clone()))))
        }
        WeightsConfig::Search(settings) => {
            let annualization = f64::from(analytics.annualization_factor);
            let search = create_search(settings, annualization)?;
            let mut source = PeriodicSearch::new(Lookback::from_setting(settings.lookback), search);
            if settings.fallback_to_monte_carlo && settings.method == SearchMethod::ClosedForm {
                let fallback = MonteCarloSearch::new(settings.num_candidates, settings.seed, annualization)?;
                source = source.with_fallback(Box::new(fallback));
            }
            Ok(Box::new(source))
        }
        WeightsConfig::Signals { path } => {
            let inputs = signals.ok_or_else(|| {
                AllocationError::InvalidParameters(format!(
                    "signal source configured but no signals were loaded from {}",
                    path.display()
                ))
            })?;
            if inputs.entries.len() != group_len {
                return Err(AllocationError::InvalidParameters(format!(
                    "signals cover {} assets but the group has {}",
                    inputs.entries.len(),
                    group_len
                )));
            }
            Ok(Box::new(SignalWeights::new(inputs.entries, inputs.exits)?))
        }
    }
}

fn create_search(settings: &SearchSettings, annualization: f64) -> Result<Box<dyn WeightSearch>, AllocationError> {
    match settings.method {
        SearchMethod::MonteCarlo => Ok(Box::new(MonteCarloSearch::new(
            settings.num_candidates,
            settings.seed,
            annualization,
        )?)),
        SearchMethod::ClosedForm => Ok(Box::new(ClosedFormSearch::new(settings.max_iterations, annualization)?)),
    }
}
