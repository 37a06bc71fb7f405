use chrono::{DateTime, Utc};
use core_types::{Fill, OrderSide};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// A completed trade: an opening lot matched against the fill that closed it.
///
/// Partial closes produce one round trip per matched slice, so `shares` may be smaller
/// than either fill. `pnl` is net of the fees attributable to the matched shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub asset: String,
    /// `Buy` for a long round trip, `Sell` for a short one.
    pub direction: OrderSide,
    pub shares: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub fees: f64,
    pub pnl: f64,
}

impl RoundTrip {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[derive(Debug, Clone)]
struct OpenLot {
    side: OrderSide,
    shares: f64,
    price: f64,
    fee_per_share: f64,
    time: DateTime<Utc>,
}

/// Matches applied fills into round trips, first in first out, per asset.
///
/// Rejected fills are ignored. A fill that crosses through zero first closes the open
/// lots and then opens a lot in the other direction with the remainder. Lots still open
/// at the end are not reported.
pub fn match_round_trips(fills: &[Fill], epsilon: f64) -> Vec<RoundTrip> {
    let mut open: HashMap<&str, VecDeque<OpenLot>> = HashMap::new();
    let mut trips = Vec::new();

    for fill in fills.iter().filter(|f| f.is_applied() && f.shares > epsilon) {
        let lots = open.entry(fill.asset.as_str()).or_default();
        let fee_per_share = fill.fees / fill.shares;
        let mut remaining = fill.shares;

        while remaining > epsilon {
            let Some(lot) = lots.front_mut() else { break };
            if lot.side == fill.side {
                break;
            }

            let matched = remaining.min(lot.shares);
            let fees = matched * (lot.fee_per_share + fee_per_share);
            let gross = matched * (fill.price - lot.price) * lot.side.sign();
            trips.push(RoundTrip {
                asset: fill.asset.clone(),
                direction: lot.side,
                shares: matched,
                entry_time: lot.time,
                exit_time: fill.timestamp,
                entry_price: lot.price,
                exit_price: fill.price,
                fees,
                pnl: gross - fees,
            });

            lot.shares -= matched;
            remaining -= matched;
            if lot.shares <= epsilon {
                lots.pop_front();
            }
        }

        if remaining > epsilon {
            lots.push_back(OpenLot {
                side: fill.side,
                shares: remaining,
                price: fill.price,
                fee_per_share,
                time: fill.timestamp,
            });
        }
    }

    trips
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_types::FillStatus;

    fn fill(day: i64, asset: &str, side: OrderSide, shares: f64, price: f64, fees: f64) -> Fill {
        Fill {
            time_index: day as usize,
            timestamp: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap() + Duration::days(day),
            asset_index: 0,
            asset: asset.to_string(),
            side,
            shares,
            price,
            fees,
            resulting_cash: 0.0,
            resulting_shares: 0.0,
            status: FillStatus::Filled,
        }
    }

    #[test]
    fn matches_lots_first_in_first_out() {
        let fills = vec![
            fill(0, "A", OrderSide::Buy, 10.0, 100.0, 0.0),
            fill(1, "A", OrderSide::Buy, 10.0, 110.0, 0.0),
            fill(2, "A", OrderSide::Sell, 15.0, 120.0, 0.0),
        ];
        let trips = match_round_trips(&fills, 1e-9);
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].shares, 10.0);
        assert_eq!(trips[0].pnl, 200.0);
        assert_eq!(trips[1].shares, 5.0);
        assert_eq!(trips[1].entry_price, 110.0);
        assert_eq!(trips[1].pnl, 50.0);
    }

    #[test]
    fn fees_reduce_pnl_pro_rata() {
        let fills = vec![
            fill(0, "A", OrderSide::Buy, 10.0, 100.0, 10.0),
            fill(3, "A", OrderSide::Sell, 5.0, 101.0, 2.0),
        ];
        let trips = match_round_trips(&fills, 1e-9);
        assert_eq!(trips.len(), 1);
        // Gross 5, entry fees 5 of 10, exit fees 2.
        assert!((trips[0].pnl - (5.0 - 5.0 - 2.0)).abs() < 1e-12);
        assert!(!trips[0].is_win());
    }

    #[test]
    fn crossing_zero_opens_a_short_lot() {
        let fills = vec![
            fill(0, "A", OrderSide::Buy, 2.0, 50.0, 0.0),
            fill(1, "A", OrderSide::Sell, 5.0, 55.0, 0.0),
            fill(2, "A", OrderSide::Buy, 3.0, 45.0, 0.0),
        ];
        let trips = match_round_trips(&fills, 1e-9);
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].direction, OrderSide::Buy);
        assert_eq!(trips[0].pnl, 10.0);
        assert_eq!(trips[1].direction, OrderSide::Sell);
        assert_eq!(trips[1].pnl, 30.0);
    }

    #[test]
    fn assets_are_matched_independently_and_rejections_ignored() {
        let mut rejected = fill(1, "A", OrderSide::Sell, 10.0, 90.0, 0.0);
        rejected.status = FillStatus::Rejected {
            reason: core_types::RejectReason::BelowMinimumSize,
        };
        let fills = vec![
            fill(0, "A", OrderSide::Buy, 1.0, 100.0, 0.0),
            fill(0, "B", OrderSide::Buy, 1.0, 10.0, 0.0),
            rejected,
            fill(2, "B", OrderSide::Sell, 1.0, 8.0, 0.0),
        ];
        let trips = match_round_trips(&fills, 1e-9);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].asset, "B");
        assert_eq!(trips[0].pnl, -2.0);
    }
}
