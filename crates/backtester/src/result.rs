use crate::error::SimulationError;
use allocation::AllocationError;
use analytics::{AnalyticsEngine, PerformanceInput, PerformanceReport};
use chrono::{DateTime, Utc};
use core_types::{AssetGroup, Fill, WeightVector};
use executor::PortfolioState;
use market_data::PricePanel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// The state of a group at the end of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub time_index: usize,
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub positions: Vec<f64>,
    /// Valuation prices the equity was computed with.
    pub prices: Vec<f64>,
    pub equity: f64,
}

impl StateSnapshot {
    pub fn from_state(time_index: usize, timestamp: DateTime<Utc>, state: &PortfolioState) -> Self {
        Self {
            time_index,
            timestamp,
            cash: state.cash,
            positions: state.positions.clone(),
            prices: state.last_valuation_price.clone(),
            equity: state.equity(),
        }
    }

    pub fn to_state(&self) -> PortfolioState {
        PortfolioState {
            cash: self.cash,
            positions: self.positions.clone(),
            last_valuation_price: self.prices.clone(),
        }
    }

    /// Invested fraction of equity; zero when the group has no equity left.
    pub fn exposure(&self) -> f64 {
        if self.equity <= 0.0 {
            return 0.0;
        }
        let invested: f64 = self.positions.iter().zip(&self.prices).map(|(s, p)| (s * p).abs()).sum();
        invested / self.equity
    }

    /// Value of each holding as a fraction of equity.
    pub fn allocation(&self) -> Vec<f64> {
        self.positions
            .iter()
            .zip(&self.prices)
            .map(|(s, p)| if self.equity > 0.0 { s * p / self.equity } else { 0.0 })
            .collect()
    }
}

/// Why a due decision did not change the targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData { available: usize, required: usize },
    InvalidWeightVector { message: String },
    SingularCovariance,
    NoFeasiblePortfolio { message: String },
    IterationLimit { iterations: usize },
    InvalidParameters { message: String },
    /// The group's equity reached zero and `halt_on_zero_equity` is set.
    ZeroEquity,
}

impl From<&AllocationError> for SkipReason {
    fn from(error: &AllocationError) -> Self {
        match error {
            AllocationError::InsufficientData { available, required } => Self::InsufficientData {
                available: *available,
                required: *required,
            },
            AllocationError::SingularCovariance => Self::SingularCovariance,
            AllocationError::NoFeasiblePortfolio(message) => Self::NoFeasiblePortfolio {
                message: message.clone(),
            },
            AllocationError::IterationLimit(iterations) => Self::IterationLimit {
                iterations: *iterations,
            },
            AllocationError::InvalidWeights(err) => Self::InvalidWeightVector {
                message: err.to_string(),
            },
            AllocationError::InvalidParameters(message) => Self::InvalidParameters {
                message: message.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// New targets were adopted. `score` is the source's Sharpe estimate, if any.
    Rebalanced { weights: WeightVector, score: Option<f64> },
    Skipped { reason: SkipReason },
}

/// One entry of the decision log: what happened at a due rebalancing point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub time_index: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: DecisionOutcome,
}

impl DecisionRecord {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, DecisionOutcome::Skipped { .. })
    }
}

/// The immutable outcome of one simulation run.
///
/// Everything a presentation layer needs (fill log, equity series, position series) is
/// derivable from the snapshots and fills, which serialise losslessly to JSON. The price
/// panel is shared with the caller and not serialised.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub run_id: Uuid,
    pub group: AssetGroup,
    pub source: String,
    pub initial_cash: f64,
    pub epsilon: f64,
    pub snapshots: Vec<StateSnapshot>,
    pub fills: Vec<Fill>,
    pub decisions: Vec<DecisionRecord>,
    #[serde(skip)]
    panel: Arc<PricePanel>,
    #[serde(skip)]
    panel_columns: Vec<usize>,
}

impl SimulationResult {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run_id: Uuid,
        group: AssetGroup,
        source: String,
        initial_cash: f64,
        epsilon: f64,
        snapshots: Vec<StateSnapshot>,
        fills: Vec<Fill>,
        decisions: Vec<DecisionRecord>,
        panel: Arc<PricePanel>,
        panel_columns: Vec<usize>,
    ) -> Self {
        Self {
            run_id,
            group,
            source,
            initial_cash,
            epsilon,
            snapshots,
            fills,
            decisions,
            panel,
            panel_columns,
        }
    }

    pub fn panel(&self) -> &PricePanel {
        &self.panel
    }

    /// The group's price columns, in group order.
    pub fn price_columns(&self) -> Vec<&[f64]> {
        self.panel_columns.iter().map(|c| self.panel.column(*c)).collect()
    }

    pub fn num_steps(&self) -> usize {
        self.snapshots.len()
    }

    pub fn final_state(&self) -> Option<PortfolioState> {
        self.snapshots.last().map(StateSnapshot::to_state)
    }

    pub fn final_equity(&self) -> f64 {
        self.snapshots.last().map_or(self.initial_cash, |s| s.equity)
    }

    pub fn equity_series(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.snapshots.iter().map(|s| (s.timestamp, s.equity)).collect()
    }

    pub fn cash_series(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.cash).collect()
    }

    /// Shares held per asset at the end of every step.
    pub fn position_series(&self) -> Vec<Vec<f64>> {
        self.snapshots.iter().map(|s| s.positions.clone()).collect()
    }

    /// Per-asset value as a fraction of equity at every step.
    pub fn allocation_series(&self) -> Vec<Vec<f64>> {
        self.snapshots.iter().map(StateSnapshot::allocation).collect()
    }

    pub fn exposure_series(&self) -> Vec<f64> {
        self.snapshots.iter().map(StateSnapshot::exposure).collect()
    }

    pub fn applied_fills(&self) -> impl Iterator<Item = &Fill> {
        self.fills.iter().filter(|f| f.is_applied())
    }

    pub fn rejected_fills(&self) -> impl Iterator<Item = &Fill> {
        self.fills.iter().filter(|f| f.is_rejected())
    }

    pub fn skipped_decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.decisions.iter().filter(|d| d.is_skipped())
    }

    /// Rebuilds the final state by applying the fill log to the initial all-cash state,
    /// marked at the last recorded prices.
    pub fn replay(&self) -> Result<PortfolioState, SimulationError> {
        let mut state = PortfolioState::new(self.initial_cash, self.group.len());
        for fill in &self.fills {
            state.apply(fill, self.epsilon)?;
            if fill.is_applied()
                && (state.cash != fill.resulting_cash || state.position(fill.asset_index) != fill.resulting_shares)
            {
                return Err(SimulationError::ReplayMismatch(format!(
                    "fill for '{}' at step {} records cash {} and shares {}, replay has {} and {}",
                    fill.asset,
                    fill.time_index,
                    fill.resulting_cash,
                    fill.resulting_shares,
                    state.cash,
                    state.position(fill.asset_index)
                )));
            }
        }
        if let Some(last) = self.snapshots.last() {
            state.update_valuation(&last.prices)?;
        }
        Ok(state)
    }

    /// Runs the analytics engine over this result.
    pub fn performance(&self, engine: &AnalyticsEngine) -> Result<PerformanceReport, SimulationError> {
        let equity_curve = self.equity_series();
        let exposure = self.exposure_series();
        let columns = self.price_columns();
        let input = PerformanceInput {
            initial_equity: self.initial_cash,
            equity_curve: &equity_curve,
            fills: &self.fills,
            exposure: &exposure,
            benchmark_columns: &columns,
            epsilon: self.epsilon,
        };
        Ok(engine.calculate(&input)?)
    }

    /// Pretty-printed JSON export of the run.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
