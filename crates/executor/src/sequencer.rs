use crate::portfolio::PortfolioState;
use core_types::{CallSequence, WeightVector};

/// Orders the assets of a group for processing within one step.
///
/// In `Auto` mode every asset whose trade is a net sell comes strictly before every
/// asset whose trade is a net buy, so a single no-overdraft pass can spend the cash the
/// sells free up. Within each direction the original asset order is kept.
#[derive(Debug, Clone, Copy)]
pub struct CallSequencer {
    mode: CallSequence,
    epsilon: f64,
}

impl CallSequencer {
    pub fn new(mode: CallSequence, epsilon: f64) -> Self {
        Self { mode, epsilon }
    }

    /// Signed value each asset has to trade to reach its target weight.
    pub fn order_values(weights: &WeightVector, state: &PortfolioState, group_equity: f64) -> Vec<f64> {
        weights
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, w)| w * group_equity - state.asset_value(i))
            .collect()
    }

    /// Sequence of asset indices for the given per-asset order values.
    pub fn sequence(&self, order_values: &[f64]) -> Vec<usize> {
        let indices = 0..order_values.len();
        match self.mode {
            CallSequence::Default => indices.collect(),
            CallSequence::Auto => {
                let (sells, rest): (Vec<usize>, Vec<usize>) =
                    indices.partition(|i| order_values[*i] < -self.epsilon);
                sells.into_iter().chain(rest).collect()
            }
        }
    }

    /// Convenience over [`Self::order_values`] and [`Self::sequence`].
    pub fn sequence_targets(&self, weights: &WeightVector, state: &PortfolioState, group_equity: f64) -> Vec<usize> {
        self.sequence(&Self::order_values(weights, state, group_equity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sells_come_first_in_asset_order() {
        let sequencer = CallSequencer::new(CallSequence::Auto, 1e-9);
        assert_eq!(sequencer.sequence(&[10.0, -5.0, 0.0, -1.0, 3.0]), vec![1, 3, 0, 2, 4]);

        let plain = CallSequencer::new(CallSequence::Default, 1e-9);
        assert_eq!(plain.sequence(&[10.0, -5.0, 0.0]), vec![0, 1, 2]);
    }

    #[test]
    fn derives_order_values_from_targets() {
        let mut state = PortfolioState::new(0.0, 2);
        state.positions = vec![10.0, 0.0];
        state.update_valuation(&[100.0, 50.0]).unwrap();
        let weights = WeightVector::new(vec![0.25, 0.75]);

        let values = CallSequencer::order_values(&weights, &state, 1000.0);
        assert_eq!(values, vec![-750.0, 750.0]);
        let sequencer = CallSequencer::new(CallSequence::Auto, 1e-9);
        assert_eq!(sequencer.sequence_targets(&weights, &state, 1000.0), vec![0, 1]);
    }

    proptest! {
        #[test]
        fn every_sell_precedes_every_buy(values in prop::collection::vec(-1000.0f64..1000.0, 1..24)) {
            let sequencer = CallSequencer::new(CallSequence::Auto, 1e-9);
            let sequence = sequencer.sequence(&values);

            let mut sorted = sequence.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..values.len()).collect::<Vec<_>>());

            let position = |i: usize| sequence.iter().position(|s| *s == i).unwrap();
            for sell in (0..values.len()).filter(|i| values[*i] < -1e-9) {
                for buy in (0..values.len()).filter(|i| values[*i] > 1e-9) {
                    prop_assert!(position(sell) < position(buy));
                }
            }
            // Stable within each direction.
            let sells: Vec<_> = sequence.iter().copied().filter(|i| values[*i] < -1e-9).collect();
            prop_assert!(sells.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
