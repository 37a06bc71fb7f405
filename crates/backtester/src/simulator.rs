use crate::error::SimulationError;
use crate::result::{DecisionOutcome, DecisionRecord, SimulationResult, SkipReason, StateSnapshot};
use allocation::{
    create_weight_source, Allocation, DecisionContext, RebalanceSchedule, SignalInputs, WeightSource,
};
use configuration::{Config, Simulation};
use core_types::{AssetGroup, Fill, Order, OrderSize, WeightVector};
use executor::{CallSequencer, Executor, PortfolioState, SimulatedExecutor};
use market_data::PricePanel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of an [`OrderSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulatorState {
    /// Waiting for the next step.
    Idle,
    /// Marking prices and consulting the schedule and weight source.
    AdvancingStep,
    /// Executing the step's orders against the group's cash.
    ApplyingOrders,
    /// Every step has been processed; no further mutation is possible.
    Finalized,
}

/// The bar-by-bar simulator for one cash-sharing group.
///
/// Each step marks the group at the current close, asks the weight source for targets
/// when the schedule is due, turns the targets into orders, and executes them sells
/// first against the group's single cash balance. Every step leaves a snapshot; every
/// order leaves a fill (rejections included); every due decision leaves a record.
pub struct OrderSimulator {
    // --- Context ---
    run_id: Uuid,
    group: AssetGroup,
    panel: Arc<PricePanel>,
    panel_columns: Vec<usize>,
    params: Simulation,
    // --- Components ---
    schedule: RebalanceSchedule,
    source: Box<dyn WeightSource>,
    executor: Box<dyn Executor>,
    sequencer: CallSequencer,
    // --- State ---
    portfolio: PortfolioState,
    state: SimulatorState,
    next_step: usize,
    targets: Option<WeightVector>,
    halted: bool,
    // --- Audit trail ---
    snapshots: Vec<StateSnapshot>,
    fills: Vec<Fill>,
    decisions: Vec<DecisionRecord>,
}

impl OrderSimulator {
    pub fn new(
        group: AssetGroup,
        panel: Arc<PricePanel>,
        params: Simulation,
        schedule: RebalanceSchedule,
        source: Box<dyn WeightSource>,
    ) -> Result<Self, SimulationError> {
        if !(params.initial_cash.is_finite() && params.initial_cash > 0.0) {
            return Err(SimulationError::InvalidParameters(format!(
                "initial cash must be positive, got {}",
                params.initial_cash
            )));
        }
        if !(params.fee_rate >= 0.0 && params.fee_rate < 1.0) {
            return Err(SimulationError::InvalidParameters(format!(
                "fee rate must be in [0, 1), got {}",
                params.fee_rate
            )));
        }
        if panel.is_empty() {
            return Err(SimulationError::InvalidParameters("the price panel has no rows".to_string()));
        }
        let panel_columns = panel.resolve_group(&group)?;

        Ok(Self {
            run_id: Uuid::new_v4(),
            portfolio: PortfolioState::new(params.initial_cash, group.len()),
            sequencer: CallSequencer::new(params.call_sequence, params.epsilon),
            executor: Box::new(SimulatedExecutor::new(params.clone())),
            snapshots: Vec::with_capacity(panel.len()),
            group,
            panel,
            panel_columns,
            params,
            schedule,
            source,
            state: SimulatorState::Idle,
            next_step: 0,
            targets: None,
            halted: false,
            fills: Vec::new(),
            decisions: Vec::new(),
        })
    }

    /// Builds a simulator from the full configuration.
    pub fn from_config(
        config: &Config,
        group: AssetGroup,
        panel: Arc<PricePanel>,
        signals: Option<SignalInputs>,
    ) -> Result<Self, SimulationError> {
        let schedule = RebalanceSchedule::from_policy(&config.rebalance);
        let source = create_weight_source(&config.weights, &config.analytics, group.len(), signals)?;
        Self::new(group, panel, config.simulation.clone(), schedule, source)
    }

    /// Replaces the default cost model.
    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    /// The targets adopted at the most recent successful decision.
    pub fn current_targets(&self) -> Option<&WeightVector> {
        self.targets.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.state == SimulatorState::Finalized
    }

    /// Processes the next time step.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        if self.state == SimulatorState::Finalized {
            return Err(SimulationError::AlreadyFinalized);
        }
        let t = self.next_step;
        let timestamp = self.panel.timestamp(t);

        // 1. Mark the group at the current close.
        self.state = SimulatorState::AdvancingStep;
        let columns: Vec<&[f64]> = self.panel_columns.iter().map(|c| self.panel.column(*c)).collect();
        let prices: Vec<f64> = columns.iter().map(|c| c[t]).collect();
        self.portfolio.update_valuation(&prices)?;
        let group_equity = self.portfolio.equity();

        if self.params.halt_on_zero_equity && !self.halted && group_equity <= self.params.epsilon {
            self.halted = true;
            tracing::warn!(
                group = %self.group.name,
                time_index = t,
                equity = group_equity,
                "Group equity reached zero; no further allocation decisions will be made."
            );
            self.decisions.push(DecisionRecord {
                time_index: t,
                timestamp,
                outcome: DecisionOutcome::Skipped {
                    reason: SkipReason::ZeroEquity,
                },
            });
        }

        // 2. Consult the weight source when a decision is due.
        let mut allocation: Option<Allocation> = None;
        if !self.halted && self.schedule.is_due(t, self.panel.index()) {
            let ctx = DecisionContext::new(t, timestamp, &columns);
            let decided = self.source.compute_weights(&ctx).and_then(|a| {
                a.weights
                    .validate(self.group.len(), self.params.long_only, self.params.epsilon)
                    .map(|_| a)
                    .map_err(Into::into)
            });
            match decided {
                Ok(a) => {
                    tracing::debug!(
                        group = %self.group.name,
                        time_index = t,
                        source = self.source.name(),
                        weights = ?a.weights.as_slice(),
                        score = ?a.score,
                        "Rebalancing."
                    );
                    self.decisions.push(DecisionRecord {
                        time_index: t,
                        timestamp,
                        outcome: DecisionOutcome::Rebalanced {
                            weights: a.weights.clone(),
                            score: a.score,
                        },
                    });
                    self.targets = Some(a.weights.clone());
                    allocation = Some(a);
                }
                Err(err) => {
                    tracing::warn!(
                        group = %self.group.name,
                        time_index = t,
                        source = self.source.name(),
                        error = %err,
                        "Skipping rebalance; holding previous targets."
                    );
                    self.decisions.push(DecisionRecord {
                        time_index: t,
                        timestamp,
                        outcome: DecisionOutcome::Skipped {
                            reason: SkipReason::from(&err),
                        },
                    });
                }
            }
        }

        // 3. Translate the targets into orders and apply them, sells first.
        if let Some(allocation) = allocation {
            self.state = SimulatorState::ApplyingOrders;
            let sequence = self
                .sequencer
                .sequence_targets(&allocation.weights, &self.portfolio, group_equity);
            for asset_index in sequence {
                if !allocation.trades(asset_index) {
                    continue;
                }
                let weight = allocation.weights.get(asset_index).unwrap_or(0.0);
                let order = Order {
                    time_index: t,
                    asset_index,
                    asset: self.group.assets[asset_index].clone(),
                    size: OrderSize::TargetPercent(weight),
                };
                let Some(fill) = self.executor.execute(&order, &self.portfolio, group_equity, timestamp)? else {
                    continue;
                };
                if fill.is_rejected() {
                    tracing::warn!(
                        group = %self.group.name,
                        time_index = t,
                        asset = %fill.asset,
                        status = ?fill.status,
                        "Order rejected."
                    );
                }
                self.portfolio.apply(&fill, self.params.epsilon)?;
                self.fills.push(fill);
            }
        }

        // 4. Record the step.
        self.snapshots.push(StateSnapshot::from_state(t, timestamp, &self.portfolio));
        self.next_step += 1;
        self.state = if self.next_step >= self.panel.len() {
            tracing::info!(
                run_id = %self.run_id,
                group = %self.group.name,
                steps = self.snapshots.len(),
                fills = self.fills.len(),
                final_equity = self.portfolio.equity(),
                "Simulation finalized."
            );
            SimulatorState::Finalized
        } else {
            SimulatorState::Idle
        };
        Ok(())
    }

    /// Runs every remaining step and hands off the result.
    pub fn run(mut self) -> Result<SimulationResult, SimulationError> {
        tracing::info!(
            run_id = %self.run_id,
            group = %self.group.name,
            source = self.source.name(),
            steps = self.panel.len(),
            "Starting simulation."
        );
        while !self.is_finalized() {
            self.step()?;
        }
        self.into_result()
    }

    /// Hands off the result of a finalized simulator.
    pub fn into_result(self) -> Result<SimulationResult, SimulationError> {
        if !self.is_finalized() {
            return Err(SimulationError::NotFinalized {
                processed: self.next_step,
                total: self.panel.len(),
            });
        }
        Ok(SimulationResult::new(
            self.run_id,
            self.group,
            self.source.name().to_string(),
            self.params.initial_cash,
            self.params.epsilon,
            self.snapshots,
            self.fills,
            self.decisions,
            self.panel,
            self.panel_columns,
        ))
    }
}
