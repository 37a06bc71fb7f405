use crate::error::AllocationError;
use crate::search::WeightSearch;
use crate::stats::{MIN_OBSERVATIONS, ReturnStats};
use chrono::{DateTime, Utc};
use core_types::WeightVector;

/// The target a weight source settled on at one decision point.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub weights: WeightVector,
    /// Sharpe estimate of `weights` when the source scored them.
    pub score: Option<f64>,
    /// Restricts trading to the flagged assets. `None` trades every asset of the group.
    pub trade_mask: Option<Vec<bool>>,
}

impl Allocation {
    pub fn new(weights: WeightVector) -> Self {
        Self {
            weights,
            score: None,
            trade_mask: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Whether the asset at `asset_index` should be traded towards its target.
    pub fn trades(&self, asset_index: usize) -> bool {
        match &self.trade_mask {
            Some(mask) => mask.get(asset_index).copied().unwrap_or(false),
            None => true,
        }
    }
}

/// How much history a decision may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    /// Every row before the decision step.
    All,
    /// The `L` rows immediately before the decision step.
    Trailing(usize),
}

impl Lookback {
    /// Maps the config's `lookback` value, where zero means the whole history.
    pub fn from_setting(lookback: usize) -> Self {
        if lookback == 0 { Self::All } else { Self::Trailing(lookback) }
    }
}

/// What a weight source can see at a decision point: the group's full price columns
/// (one per asset, in group order) and the step being decided.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub time_index: usize,
    pub timestamp: DateTime<Utc>,
    pub columns: &'a [&'a [f64]],
}

impl<'a> DecisionContext<'a> {
    pub fn new(time_index: usize, timestamp: DateTime<Utc>, columns: &'a [&'a [f64]]) -> Self {
        Self {
            time_index,
            timestamp,
            columns,
        }
    }

    pub fn num_assets(&self) -> usize {
        self.columns.len()
    }

    /// The history window a decision at `time_index` may use. The current row is never
    /// part of it.
    pub fn window(&self, lookback: Lookback) -> Result<Vec<&'a [f64]>, AllocationError> {
        let end = self.time_index;
        let start = match lookback {
            Lookback::All => 0,
            Lookback::Trailing(length) => {
                if end <= length {
                    return Err(AllocationError::InsufficientData {
                        available: end.saturating_sub(1),
                        required: length.max(MIN_OBSERVATIONS),
                    });
                }
                end - length
            }
        };
        Ok(self.columns.iter().map(|c| &c[start..end.min(c.len())]).collect())
    }

    pub fn current_prices(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c[self.time_index]).collect()
    }
}

/// The interface every allocation rule implements.
///
/// `&mut self` lets sources carry state between decisions (signal-driven targets are
/// held until the next entry or exit). `Send` allows runs to move across the batch
/// runner's worker threads.
pub trait WeightSource: Send {
    /// Computes the target allocation for the decision described by `ctx`.
    ///
    /// An error means the decision is skipped and the group holds its previous targets.
    fn compute_weights(&mut self, ctx: &DecisionContext<'_>) -> Result<Allocation, AllocationError>;

    fn name(&self) -> &'static str;
}

/// A constant target, independent of history.
#[derive(Debug, Clone)]
pub struct FixedWeights {
    weights: WeightVector,
}

impl FixedWeights {
    pub fn new(weights: WeightVector) -> Self {
        Self { weights }
    }
}

impl WeightSource for FixedWeights {
    fn compute_weights(&mut self, ctx: &DecisionContext<'_>) -> Result<Allocation, AllocationError> {
        if self.weights.len() != ctx.num_assets() {
            return Err(AllocationError::InvalidParameters(format!(
                "{} fixed weights for a group of {} assets",
                self.weights.len(),
                ctx.num_assets()
            )));
        }
        Ok(Allocation::new(self.weights.clone()))
    }

    fn name(&self) -> &'static str {
        "FixedWeights"
    }
}

/// Re-optimises the Sharpe ratio over a lookback window at every decision.
#[derive(Debug)]
pub struct PeriodicSearch {
    lookback: Lookback,
    search: Box<dyn WeightSearch>,
    /// Tried when the primary search fails for a reason other than missing data.
    fallback: Option<Box<dyn WeightSearch>>,
}

impl PeriodicSearch {
    pub fn new(lookback: Lookback, search: Box<dyn WeightSearch>) -> Self {
        Self {
            lookback,
            search,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn WeightSearch>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl WeightSource for PeriodicSearch {
    fn compute_weights(&mut self, ctx: &DecisionContext<'_>) -> Result<Allocation, AllocationError> {
        let window = ctx.window(self.lookback)?;
        let stats = ReturnStats::from_price_columns(&window)?;

        let outcome = match self.search.search(&stats, ctx.time_index) {
            Ok(outcome) => outcome,
            Err(err @ AllocationError::InsufficientData { .. }) => return Err(err),
            Err(err) => match &self.fallback {
                Some(fallback) => {
                    tracing::debug!(
                        time_index = ctx.time_index,
                        primary = self.search.name(),
                        fallback = fallback.name(),
                        error = %err,
                        "Primary search failed; trying fallback."
                    );
                    fallback.search(&stats, ctx.time_index)?
                }
                None => return Err(err),
            },
        };

        Ok(Allocation::new(WeightVector::new(outcome.weights)).with_score(outcome.sharpe))
    }

    fn name(&self) -> &'static str {
        "PeriodicSearch"
    }
}

/// Targets driven by precomputed entry and exit flags.
///
/// An entry sets the asset's target to `1 / n` of group equity and an exit to zero;
/// otherwise the target is held. Only assets whose target changed are traded, so a held
/// position drifts with its price like an order-per-signal backtest would.
#[derive(Debug, Clone)]
pub struct SignalWeights {
    entries: Vec<Vec<bool>>,
    exits: Vec<Vec<bool>>,
    targets: Vec<f64>,
}

impl SignalWeights {
    pub fn new(entries: Vec<Vec<bool>>, exits: Vec<Vec<bool>>) -> Result<Self, AllocationError> {
        if entries.len() != exits.len() {
            return Err(AllocationError::InvalidParameters(format!(
                "{} entry columns but {} exit columns",
                entries.len(),
                exits.len()
            )));
        }
        let targets = vec![0.0; entries.len()];
        Ok(Self { entries, exits, targets })
    }
}

impl WeightSource for SignalWeights {
    fn compute_weights(&mut self, ctx: &DecisionContext<'_>) -> Result<Allocation, AllocationError> {
        let n = ctx.num_assets();
        if self.entries.len() != n {
            return Err(AllocationError::InvalidParameters(format!(
                "signals for {} assets in a group of {}",
                self.entries.len(),
                n
            )));
        }

        let t = ctx.time_index;
        let slot = 1.0 / n as f64;
        let mut mask = vec![false; n];
        for asset in 0..n {
            let entry = self.entries[asset].get(t).copied().unwrap_or(false);
            let exit = self.exits[asset].get(t).copied().unwrap_or(false);
            // Conflicting flags on the same bar cancel out.
            let target = match (entry, exit) {
                (true, false) => slot,
                (false, true) => 0.0,
                _ => continue,
            };
            if target != self.targets[asset] {
                self.targets[asset] = target;
                mask[asset] = true;
            }
        }

        Ok(Allocation {
            weights: WeightVector::new(self.targets.clone()),
            score: None,
            trade_mask: Some(mask),
        })
    }

    fn name(&self) -> &'static str {
        "SignalWeights"
    }
}
