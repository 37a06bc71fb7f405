use crate::error::ExecutorError;
use crate::portfolio::PortfolioState;
use chrono::{DateTime, Utc};
use configuration::Simulation;
use core_types::{Fill, FillStatus, Order, OrderSide, RejectReason};

const MAX_SHRINK_STEPS: usize = 8;
const SHRINK_FACTOR: f64 = 1e-12;

/// A generic trait for an execution cost model.
///
/// Implementations decide how an order fills against a group's current state but
/// **do not modify the state itself**. The caller applies the returned `Fill` to the
/// `PortfolioState`.
pub trait Executor: Send + Sync {
    /// Prices and sizes `order` against `state`.
    ///
    /// `group_equity` is the group's equity at the start of the step, so every order of
    /// one step is sized against the same value. Returns `Ok(None)` when the order
    /// amounts to no trade.
    fn execute(
        &self,
        order: &Order,
        state: &PortfolioState,
        group_equity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Fill>, ExecutorError>;
}

/// The "virtual exchange" for simulation.
///
/// Orders fill at the asset's last valuation price. Fees are `|value| * fee_rate`,
/// debited on both sides. A buy that would take cash below `-epsilon` is shrunk to what
/// the cash can pay for when partial fills are enabled, and rejected otherwise.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    params: Simulation,
}

impl SimulatedExecutor {
    pub fn new(params: Simulation) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Simulation {
        &self.params
    }

    fn round_shares(&self, shares: f64) -> f64 {
        if self.params.allow_fractional_shares {
            shares
        } else {
            shares.trunc()
        }
    }

    /// Most shares the available cash pays for, fees included.
    fn affordable_shares(&self, cash: f64, price: f64) -> f64 {
        let budget = cash.max(0.0);
        self.round_shares(budget / (price * (1.0 + self.params.fee_rate)))
    }

    /// The largest partial buy whose settled cash stays within `-epsilon`.
    ///
    /// The fee-inclusive size is computed by division, so its settled debit can overshoot
    /// the cash by a few ulps on large balances. The size is shrunk until it settles.
    fn affordable_fill(
        &self,
        order: &Order,
        state: &PortfolioState,
        requested: f64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<Fill> {
        let epsilon = self.params.epsilon;
        let status = FillStatus::Partial {
            requested_shares: requested,
        };
        let mut shares = self.affordable_shares(state.cash, price).min(requested);
        for _ in 0..MAX_SHRINK_STEPS {
            if shares * price <= epsilon {
                return None;
            }
            let fill = self.settle(order, state, OrderSide::Buy, shares, price, timestamp, status.clone());
            if fill.resulting_cash >= -epsilon {
                return Some(fill);
            }
            shares = if self.params.allow_fractional_shares {
                shares * (1.0 - SHRINK_FACTOR)
            } else {
                shares - 1.0
            };
        }
        None
    }

    /// Builds a fill and settles its resulting balances against `state`.
    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        order: &Order,
        state: &PortfolioState,
        side: OrderSide,
        shares: f64,
        price: f64,
        timestamp: DateTime<Utc>,
        status: FillStatus,
    ) -> Fill {
        let applied = !matches!(status, FillStatus::Rejected { .. });
        let fees = if applied { shares * price * self.params.fee_rate } else { 0.0 };
        let mut fill = Fill {
            time_index: order.time_index,
            timestamp,
            asset_index: order.asset_index,
            asset: order.asset.clone(),
            side,
            shares,
            price,
            fees,
            resulting_cash: state.cash,
            resulting_shares: state.position(order.asset_index),
            status,
        };
        fill.resulting_cash = state.cash + fill.cash_delta();
        fill.resulting_shares = state.position(order.asset_index) + fill.signed_shares();
        fill
    }
}

impl Executor for SimulatedExecutor {
    fn execute(
        &self,
        order: &Order,
        state: &PortfolioState,
        group_equity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Fill>, ExecutorError> {
        let asset_index = order.asset_index;
        if asset_index >= state.num_assets() {
            return Err(ExecutorError::UnknownAsset(asset_index));
        }
        let price = state.last_valuation_price[asset_index];
        if !(price.is_finite() && price > 0.0) {
            return Err(ExecutorError::InvalidPrice { asset_index, price });
        }

        let current = state.position(asset_index);
        let delta = self.round_shares(order.delta_shares(current, price, group_equity));
        let epsilon = self.params.epsilon;
        if (delta * price).abs() <= epsilon {
            return Ok(None);
        }

        let side = OrderSide::from_delta(delta);
        let requested = delta.abs();

        let fill = match side {
            OrderSide::Sell => {
                if self.params.long_only && requested > current + epsilon {
                    let reason = RejectReason::InsufficientPosition {
                        requested,
                        available: current,
                    };
                    self.settle(order, state, side, requested, price, timestamp, FillStatus::Rejected { reason })
                } else {
                    self.settle(order, state, side, requested, price, timestamp, FillStatus::Filled)
                }
            }
            OrderSide::Buy => {
                let full = self.settle(order, state, side, requested, price, timestamp, FillStatus::Filled);
                if full.resulting_cash >= -epsilon {
                    full
                } else {
                    let required = -full.cash_delta();
                    let affordable = if self.params.partial_fills {
                        self.affordable_fill(order, state, requested, price, timestamp)
                    } else {
                        None
                    };
                    let reason = if self.params.partial_fills && state.cash > epsilon && affordable.is_none() {
                        RejectReason::BelowMinimumSize
                    } else {
                        RejectReason::InsufficientCash {
                            required,
                            available: state.cash,
                        }
                    };
                    match affordable {
                        Some(partial) => partial,
                        None => self.settle(order, state, side, requested, price, timestamp, FillStatus::Rejected { reason }),
                    }
                }
            }
        };

        tracing::debug!(
            time_index = fill.time_index,
            asset = %fill.asset,
            side = ?fill.side,
            shares = fill.shares,
            price = fill.price,
            fees = fill.fees,
            status = ?fill.status,
            "Simulated execution."
        );
        Ok(Some(fill))
    }
}
