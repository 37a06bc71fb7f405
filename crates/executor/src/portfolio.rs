use crate::error::ExecutorError;
use core_types::Fill;
use serde::{Deserialize, Serialize};

/// The cash and holdings of one cash-sharing group.
///
/// Positions and valuation prices are indexed by the asset's position in the group.
/// Its sole responsibility is to reflect the state implied by the fills applied to it;
/// deciding how an order fills is the executor's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub positions: Vec<f64>,
    pub last_valuation_price: Vec<f64>,
}

impl PortfolioState {
    /// Creates an all-cash state. Valuation prices stay at zero until the first update.
    pub fn new(initial_cash: f64, num_assets: usize) -> Self {
        Self {
            cash: initial_cash,
            positions: vec![0.0; num_assets],
            last_valuation_price: vec![0.0; num_assets],
        }
    }

    pub fn num_assets(&self) -> usize {
        self.positions.len()
    }

    /// Marks every asset at the current bar's prices.
    pub fn update_valuation(&mut self, prices: &[f64]) -> Result<(), ExecutorError> {
        if prices.len() != self.num_assets() {
            return Err(ExecutorError::PortfolioError(format!(
                "{} valuation prices for {} assets",
                prices.len(),
                self.num_assets()
            )));
        }
        if let Some((asset_index, price)) = prices.iter().enumerate().find(|(_, p)| !(p.is_finite() && **p > 0.0)) {
            return Err(ExecutorError::InvalidPrice {
                asset_index,
                price: *price,
            });
        }
        self.last_valuation_price.copy_from_slice(prices);
        Ok(())
    }

    pub fn position(&self, asset_index: usize) -> f64 {
        self.positions.get(asset_index).copied().unwrap_or(0.0)
    }

    /// Market value of one holding at its last valuation price.
    pub fn asset_value(&self, asset_index: usize) -> f64 {
        self.position(asset_index) * self.last_valuation_price.get(asset_index).copied().unwrap_or(0.0)
    }

    pub fn positions_value(&self) -> f64 {
        (0..self.num_assets()).map(|i| self.asset_value(i)).sum()
    }

    /// Equity = Cash + Market Value of all holdings.
    pub fn equity(&self) -> f64 {
        self.cash + self.positions_value()
    }

    /// Applies a fill to the state. Rejected fills leave it untouched.
    ///
    /// The fill must not take cash below `-epsilon`; the simulator only produces fills
    /// that satisfy this, so a failure here points at a corrupted fill log.
    pub fn apply(&mut self, fill: &Fill, epsilon: f64) -> Result<(), ExecutorError> {
        if !fill.is_applied() {
            return Ok(());
        }
        if fill.asset_index >= self.num_assets() {
            return Err(ExecutorError::UnknownAsset(fill.asset_index));
        }

        let cash = self.cash + fill.cash_delta();
        if cash < -epsilon {
            return Err(ExecutorError::InsufficientCash {
                required: -fill.cash_delta(),
                available: self.cash,
            });
        }

        self.cash = cash;
        self.positions[fill.asset_index] += fill.signed_shares();
        Ok(())
    }
}
