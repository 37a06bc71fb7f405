use crate::error::AnalyticsError;
use crate::report::PerformanceReport;
use crate::trades::{match_round_trips, RoundTrip};
use chrono::{DateTime, Utc};
use configuration::AnalyticsSettings;
use core_types::Fill;
use std::time::Duration;

/// A borrowed view of one simulation run.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceInput<'a> {
    pub initial_equity: f64,
    /// Group equity at the end of every recorded step.
    pub equity_curve: &'a [(DateTime<Utc>, f64)],
    /// The ordered fill log, rejected orders included.
    pub fills: &'a [Fill],
    /// Invested fraction of equity at every recorded step.
    pub exposure: &'a [f64],
    /// Close prices of the group's assets, for the buy-and-hold benchmark.
    pub benchmark_columns: &'a [&'a [f64]],
    pub epsilon: f64,
}

/// A stateless calculator for deriving performance metrics from a simulation run.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    settings: AnalyticsSettings,
}

impl AnalyticsEngine {
    pub fn new(settings: AnalyticsSettings) -> Self {
        Self { settings }
    }

    fn annualization(&self) -> f64 {
        f64::from(self.settings.annualization_factor)
    }

    /// The main entry point for calculating performance metrics.
    pub fn calculate(&self, input: &PerformanceInput<'_>) -> Result<PerformanceReport, AnalyticsError> {
        if !(input.initial_equity.is_finite() && input.initial_equity > 0.0) {
            return Err(AnalyticsError::InvalidInput(format!(
                "initial equity must be positive, got {}",
                input.initial_equity
            )));
        }
        if input.equity_curve.is_empty() {
            return Err(AnalyticsError::NotEnoughData("the equity curve is empty".to_string()));
        }

        let mut report = PerformanceReport::new(input.initial_equity);
        self.calculate_returns(input, &mut report);
        self.calculate_drawdown(input, &mut report);
        self.calculate_exposure(input, &mut report);

        let trips = match_round_trips(input.fills, input.epsilon);
        self.calculate_trade_stats(&trips, &mut report);
        report.total_fees = input.fills.iter().filter(|f| f.is_applied()).map(|f| f.fees).sum();
        report.rejected_orders = input.fills.iter().filter(|f| f.is_rejected()).count();
        report.benchmark_return = benchmark_return(input.benchmark_columns);

        tracing::debug!(
            steps = report.num_steps,
            total_return = report.total_return,
            trades = report.total_trades,
            "Performance report calculated."
        );
        Ok(report)
    }

    /// Total and annualised return, volatility and Sharpe ratio.
    fn calculate_returns(&self, input: &PerformanceInput<'_>, report: &mut PerformanceReport) {
        let a = self.annualization();
        let initial = input.initial_equity;
        let final_equity = input.equity_curve[input.equity_curve.len() - 1].1;
        let num_steps = input.equity_curve.len();

        report.final_equity = final_equity;
        report.num_steps = num_steps;
        report.total_return = final_equity / initial - 1.0;
        report.annualized_return = if final_equity > 0.0 {
            (final_equity / initial).powf(a / num_steps as f64) - 1.0
        } else {
            -1.0
        };

        let returns = step_returns(initial, input.equity_curve);
        let Some((mean, stdev)) = mean_and_sample_stdev(&returns) else {
            return;
        };
        report.annualized_volatility = Some(stdev * a.sqrt());
        if stdev > 0.0 {
            let sharpe = a.sqrt() * (mean - self.settings.risk_free_rate_per_step) / stdev;
            report.sharpe_ratio = sharpe.is_finite().then_some(sharpe);
        }
    }

    fn calculate_drawdown(&self, input: &PerformanceInput<'_>, report: &mut PerformanceReport) {
        let series = drawdown_series(input.initial_equity, input.equity_curve);
        report.max_drawdown = series.iter().copied().fold(0.0, f64::min);
        if report.max_drawdown < 0.0 {
            let calmar = report.annualized_return / report.max_drawdown.abs();
            report.calmar_ratio = calmar.is_finite().then_some(calmar);
        }
    }

    fn calculate_exposure(&self, input: &PerformanceInput<'_>, report: &mut PerformanceReport) {
        if input.exposure.is_empty() {
            return;
        }
        report.max_exposure = input.exposure.iter().copied().fold(0.0, f64::max);
        report.average_exposure = input.exposure.iter().sum::<f64>() / input.exposure.len() as f64;
    }

    /// Calculates all trade-level metrics from FIFO round trips.
    fn calculate_trade_stats(&self, trips: &[RoundTrip], report: &mut PerformanceReport) {
        report.total_trades = trips.len();
        if trips.is_empty() {
            return;
        }

        for trip in trips {
            report.total_net_profit += trip.pnl;
            if trip.is_win() {
                report.gross_profit += trip.pnl;
                report.winning_trades += 1;
            } else {
                report.gross_loss += trip.pnl.abs();
                report.losing_trades += 1;
            }
        }

        report.win_rate = Some(report.winning_trades as f64 / report.total_trades as f64);
        if report.gross_loss > 0.0 {
            report.profit_factor = Some(report.gross_profit / report.gross_loss);
        }
        if report.winning_trades > 0 {
            report.average_win = report.gross_profit / report.winning_trades as f64;
        }
        if report.losing_trades > 0 {
            report.average_loss = report.gross_loss / report.losing_trades as f64;
        }
        report.largest_win = trips.iter().map(|t| t.pnl).reduce(f64::max);
        report.largest_loss = trips.iter().map(|t| t.pnl).reduce(f64::min);

        let total_secs: f64 = trips
            .iter()
            .map(|t| (t.exit_time - t.entry_time).num_milliseconds().max(0) as f64 / 1000.0)
            .sum();
        report.average_holding_period = Duration::from_secs_f64(total_secs / trips.len() as f64);
    }
}

/// Simple return of every step against the previous step, the first step measured
/// against the initial equity. A step following a non-positive equity returns zero.
pub fn step_returns(initial_equity: f64, equity_curve: &[(DateTime<Utc>, f64)]) -> Vec<f64> {
    let mut previous = initial_equity;
    equity_curve
        .iter()
        .map(|&(_, equity)| {
            let r = if previous > 0.0 { equity / previous - 1.0 } else { 0.0 };
            previous = equity;
            r
        })
        .collect()
}

/// `equity / running_max - 1` at every step, with the running maximum floored at the
/// initial equity. Values are clamped to `[-1, 0]`.
pub fn drawdown_series(initial_equity: f64, equity_curve: &[(DateTime<Utc>, f64)]) -> Vec<f64> {
    let mut peak = initial_equity;
    equity_curve
        .iter()
        .map(|&(_, equity)| {
            peak = peak.max(equity);
            if peak > 0.0 {
                (equity / peak - 1.0).clamp(-1.0, 0.0)
            } else {
                0.0
            }
        })
        .collect()
}

fn mean_and_sample_stdev(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

fn benchmark_return(columns: &[&[f64]]) -> Option<f64> {
    let returns: Vec<f64> = columns
        .iter()
        .filter_map(|c| match (c.first(), c.last()) {
            (Some(first), Some(last)) if *first > 0.0 => Some(last / first - 1.0),
            _ => None,
        })
        .collect();
    if returns.is_empty() || returns.len() != columns.len() {
        return None;
    }
    Some(returns.iter().sum::<f64>() / returns.len() as f64)
}
