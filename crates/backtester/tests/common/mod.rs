//! Shared fixtures for the simulator integration tests.

#![allow(dead_code)]

use allocation::{Allocation, AllocationError, DecisionContext, WeightSource};
use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::{
    AnalyticsSettings, Config, DataSettings, LoggingSettings, Parallelism, RebalancePolicy, Simulation,
    WeightsConfig,
};
use core_types::{AssetGroup, WeightVector};
use market_data::PricePanel;
use std::sync::Arc;

pub fn daily_index(rows: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
    (0..rows).map(|i| start + Duration::days(i as i64)).collect()
}

pub fn panel(columns: Vec<(&str, Vec<f64>)>) -> Arc<PricePanel> {
    let rows = columns[0].1.len();
    let columns = columns.into_iter().map(|(s, p)| (s.to_string(), p)).collect();
    Arc::new(PricePanel::from_prices(daily_index(rows), columns).unwrap())
}

pub fn group(assets: &[&str]) -> AssetGroup {
    AssetGroup::new("basket", assets.iter().map(|a| a.to_string()).collect()).unwrap()
}

pub fn simulation(initial_cash: f64, fee_rate: f64) -> Simulation {
    Simulation {
        initial_cash,
        fee_rate,
        ..Simulation::default()
    }
}

pub fn config(simulation: Simulation, rebalance: RebalancePolicy, weights: WeightsConfig) -> Config {
    Config {
        simulation,
        rebalance,
        weights,
        analytics: AnalyticsSettings::default(),
        data: DataSettings::default(),
        logging: LoggingSettings::default(),
        parallelism: Parallelism::default(),
    }
}

/// A geometric random-walk-like path built from fixed per-step returns.
pub fn path(start: f64, returns: &[f64]) -> Vec<f64> {
    let mut prices = Vec::with_capacity(returns.len() + 1);
    prices.push(start);
    for r in returns {
        let last = prices[prices.len() - 1];
        prices.push(last * (1.0 + r));
    }
    prices
}

/// Weight source that plays back a fixed script, one vector per decision.
pub struct ScriptedWeights {
    script: Vec<Vec<f64>>,
    calls: usize,
}

impl ScriptedWeights {
    pub fn new(script: Vec<Vec<f64>>) -> Self {
        Self { script, calls: 0 }
    }
}

impl WeightSource for ScriptedWeights {
    fn compute_weights(&mut self, _ctx: &DecisionContext<'_>) -> Result<Allocation, AllocationError> {
        let weights = self.script[self.calls.min(self.script.len() - 1)].clone();
        self.calls += 1;
        Ok(Allocation::new(WeightVector::new(weights)))
    }

    fn name(&self) -> &'static str {
        "ScriptedWeights"
    }
}
