use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side implied by a signed share delta. Positive deltas buy.
    pub fn from_delta(delta_shares: f64) -> Self {
        if delta_shares < 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }

    /// `+1.0` for buys, `-1.0` for sells.
    pub fn sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

/// The order in which the assets of a group are processed within one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSequence {
    /// Plain asset order.
    Default,
    /// Net sells first, then net buys, each in asset order.
    #[default]
    Auto,
}
