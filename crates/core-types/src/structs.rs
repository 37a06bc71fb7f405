use crate::enums::OrderSide;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A cash-sharing basket of assets. All trades of the group's assets draw from one
/// cash balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub name: String,
    pub assets: Vec<String>,
}

impl AssetGroup {
    pub fn new(name: impl Into<String>, assets: Vec<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if assets.is_empty() {
            return Err(CoreError::InvalidInput(
                "group".to_string(),
                format!("group '{}' has no assets", name),
            ));
        }
        let mut seen = HashSet::new();
        for asset in &assets {
            if !seen.insert(asset.as_str()) {
                return Err(CoreError::InvalidInput(
                    "group".to_string(),
                    format!("asset '{}' appears twice in group '{}'", asset, name),
                ));
            }
        }
        Ok(Self { name, assets })
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Target fraction of group equity per group asset, in group order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
    pub fn new(weights: Vec<f64>) -> Self {
        Self(weights)
    }

    /// All-cash allocation.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn equal(len: usize) -> Self {
        if len == 0 {
            return Self(Vec::new());
        }
        Self(vec![1.0 / len as f64; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Checks the vector against the group size and the long-only policy.
    ///
    /// Weights must be finite, sum to at most one and, when `long_only` is set,
    /// be non-negative. `epsilon` absorbs rounding in both comparisons.
    pub fn validate(&self, expected_len: usize, long_only: bool, epsilon: f64) -> Result<(), CoreError> {
        if self.0.len() != expected_len {
            return Err(CoreError::InvalidWeightVector(format!(
                "expected {} weights, got {}",
                expected_len,
                self.0.len()
            )));
        }
        if let Some((i, w)) = self.0.iter().enumerate().find(|(_, w)| !w.is_finite()) {
            return Err(CoreError::InvalidWeightVector(format!(
                "weight {} is not finite ({})",
                i, w
            )));
        }
        if long_only {
            if let Some((i, w)) = self.0.iter().enumerate().find(|(_, w)| **w < -epsilon) {
                return Err(CoreError::InvalidWeightVector(format!(
                    "weight {} is negative ({}) while long-only is enforced",
                    i, w
                )));
            }
        }
        let sum = self.sum();
        if sum > 1.0 + epsilon {
            return Err(CoreError::InvalidWeightVector(format!(
                "weights sum to {} which exceeds 1",
                sum
            )));
        }
        Ok(())
    }
}

impl From<Vec<f64>> for WeightVector {
    fn from(weights: Vec<f64>) -> Self {
        Self::new(weights)
    }
}

/// How the size of an order is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderSize {
    /// Fraction of group equity the position should be worth after the trade.
    TargetPercent(f64),
    /// Absolute number of shares to hold after the trade.
    TargetShares(f64),
    /// Number of shares to buy (positive) or sell (negative).
    DeltaShares(f64),
}

/// A requested trade for one asset at one step. Orders live only for the duration of
/// the step that created them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub time_index: usize,
    pub asset_index: usize,
    pub asset: String,
    pub size: OrderSize,
}

impl Order {
    /// Signed number of shares the order asks for, given the current holding, the
    /// asset's valuation price and the group's equity.
    pub fn delta_shares(&self, current_shares: f64, price: f64, group_equity: f64) -> f64 {
        match self.size {
            OrderSize::TargetPercent(weight) => {
                if price <= 0.0 {
                    return 0.0;
                }
                (weight * group_equity) / price - current_shares
            }
            OrderSize::TargetShares(target) => target - current_shares,
            OrderSize::DeltaShares(delta) => delta,
        }
    }
}

/// Why an order was not applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// The order would have driven the group's cash below zero.
    InsufficientCash { required: f64, available: f64 },
    /// A long-only sell asked for more shares than the group holds.
    InsufficientPosition { requested: f64, available: f64 },
    /// Partial fills are on but the affordable size rounds down to nothing.
    BelowMinimumSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FillStatus {
    Filled,
    /// Only part of the requested size could be afforded.
    Partial { requested_shares: f64 },
    Rejected { reason: RejectReason },
}

/// Immutable record of an executed (or explicitly rejected) order.
///
/// `shares` is always non-negative; the direction lives in `side`. For rejected
/// orders `shares` holds the requested size, `fees` is zero and the resulting
/// balances equal the balances before the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub time_index: usize,
    pub timestamp: DateTime<Utc>,
    pub asset_index: usize,
    pub asset: String,
    pub side: OrderSide,
    pub shares: f64,
    pub price: f64,
    pub fees: f64,
    pub resulting_cash: f64,
    pub resulting_shares: f64,
    #[serde(flatten)]
    pub status: FillStatus,
}

impl Fill {
    /// True for fills that changed the portfolio.
    pub fn is_applied(&self) -> bool {
        !matches!(self.status, FillStatus::Rejected { .. })
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_applied()
    }

    /// Gross traded value, always non-negative.
    pub fn value(&self) -> f64 {
        self.shares * self.price
    }

    /// Signed share change applied to the position.
    pub fn signed_shares(&self) -> f64 {
        if !self.is_applied() {
            return 0.0;
        }
        self.side.sign() * self.shares
    }

    /// Signed cash change applied to the group, fees included.
    pub fn cash_delta(&self) -> f64 {
        if !self.is_applied() {
            return 0.0;
        }
        -self.side.sign() * self.value() - self.fees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fill(side: OrderSide, status: FillStatus) -> Fill {
        Fill {
            time_index: 0,
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            asset_index: 0,
            asset: "AAPL".to_string(),
            side,
            shares: 2.0,
            price: 50.0,
            fees: 1.0,
            resulting_cash: 0.0,
            resulting_shares: 2.0,
            status,
        }
    }

    #[test]
    fn weight_vector_rejects_negative_weights_when_long_only() {
        let weights = WeightVector::new(vec![0.6, -0.1]);
        assert!(matches!(
            weights.validate(2, true, 1e-9),
            Err(CoreError::InvalidWeightVector(_))
        ));
        assert!(weights.validate(2, false, 1e-9).is_ok());
    }

    #[test]
    fn weight_vector_rejects_leverage_and_wrong_length() {
        assert!(WeightVector::new(vec![0.7, 0.4]).validate(2, true, 1e-9).is_err());
        assert!(WeightVector::new(vec![0.5]).validate(2, true, 1e-9).is_err());
        assert!(WeightVector::new(vec![f64::NAN, 0.0]).validate(2, true, 1e-9).is_err());
        // A sum a hair above one is rounding, not leverage.
        assert!(WeightVector::new(vec![0.5, 0.5 + 1e-12]).validate(2, true, 1e-9).is_ok());
    }

    #[test]
    fn order_delta_shares_by_size_type() {
        let order = |size| Order { time_index: 0, asset_index: 0, asset: "A".into(), size };
        assert_eq!(order(OrderSize::TargetPercent(0.5)).delta_shares(1.0, 100.0, 1000.0), 4.0);
        assert_eq!(order(OrderSize::TargetShares(3.0)).delta_shares(5.0, 100.0, 1000.0), -2.0);
        assert_eq!(order(OrderSize::DeltaShares(-1.5)).delta_shares(5.0, 100.0, 1000.0), -1.5);
    }

    #[test]
    fn fill_cash_delta_includes_fees_on_both_sides() {
        assert_eq!(fill(OrderSide::Buy, FillStatus::Filled).cash_delta(), -101.0);
        assert_eq!(fill(OrderSide::Sell, FillStatus::Filled).cash_delta(), 99.0);
        let rejected = fill(
            OrderSide::Buy,
            FillStatus::Rejected { reason: RejectReason::BelowMinimumSize },
        );
        assert_eq!(rejected.cash_delta(), 0.0);
        assert_eq!(rejected.signed_shares(), 0.0);
    }

    #[test]
    fn asset_group_rejects_duplicates() {
        assert!(AssetGroup::new("g", vec!["A".into(), "A".into()]).is_err());
        assert!(AssetGroup::new("g", vec![]).is_err());
        assert_eq!(AssetGroup::new("g", vec!["A".into(), "B".into()]).unwrap().len(), 2);
    }

    #[test]
    fn fill_status_serializes_flat() {
        let json = serde_json::to_value(fill(OrderSide::Buy, FillStatus::Filled)).unwrap();
        assert_eq!(json["status"], "filled");
        assert_eq!(json["side"], "Buy");
    }
}
