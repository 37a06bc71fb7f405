use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A comprehensive, standardized report of a simulation run's performance.
///
/// Returns and drawdowns are fractions (0.05 is 5%). Ratios that can be undefined
/// (zero volatility, no losing trades, no trades at all) are `None` rather than
/// infinite or NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // I. Returns
    pub initial_equity: f64,
    pub final_equity: f64,
    pub num_steps: usize,
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    /// Equal-weighted buy-and-hold return of the group's assets over the same period.
    pub benchmark_return: Option<f64>,

    // II. Risk and Drawdown
    pub max_drawdown: f64,
    pub calmar_ratio: Option<f64>,
    pub max_exposure: f64,
    pub average_exposure: f64,

    // III. Trade-Level Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: Option<f64>,
    pub total_net_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: Option<f64>,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: Option<f64>,
    pub largest_loss: Option<f64>,
    pub total_fees: f64,
    pub rejected_orders: usize,

    // IV. Time-Based Metrics
    #[serde(with = "humantime_serde")]
    pub average_holding_period: Duration,
}

impl PerformanceReport {
    /// Creates a zeroed-out report for a run that starts and ends with `initial_equity`.
    pub fn new(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            final_equity: initial_equity,
            num_steps: 0,
            total_return: 0.0,
            annualized_return: 0.0,
            annualized_volatility: None,
            sharpe_ratio: None,
            benchmark_return: None,
            max_drawdown: 0.0,
            calmar_ratio: None,
            max_exposure: 0.0,
            average_exposure: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: None,
            total_net_profit: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            profit_factor: None,
            average_win: 0.0,
            average_loss: 0.0,
            largest_win: None,
            largest_loss: None,
            total_fees: 0.0,
            rejected_orders: 0,
            average_holding_period: Duration::ZERO,
        }
    }
}
