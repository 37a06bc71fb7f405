use crate::error::AllocationError;
use crate::search::{SearchOutcome, WeightSearch};
use crate::stats::ReturnStats;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Random search over the long-only simplex.
///
/// Candidate `i` at decision `t` comes from a ChaCha8 generator seeded with `(seed, t)`
/// on stream `i`: each component is drawn uniformly from `[0, 1)` and the vector is
/// normalised to sum to one. Candidates are scored in parallel and reduced by highest
/// Sharpe, ties going to the lowest candidate index, so the result depends only on the
/// seed and never on the number of threads.
#[derive(Debug, Clone)]
pub struct MonteCarloSearch {
    num_candidates: usize,
    seed: u64,
    annualization_factor: f64,
}

#[derive(Debug)]
struct Candidate {
    index: usize,
    sharpe: f64,
    weights: Vec<f64>,
}

impl Candidate {
    fn better(a: Candidate, b: Candidate) -> Candidate {
        match a.sharpe.total_cmp(&b.sharpe) {
            Ordering::Greater => a,
            Ordering::Less => b,
            Ordering::Equal if a.index <= b.index => a,
            Ordering::Equal => b,
        }
    }
}

impl MonteCarloSearch {
    pub fn new(num_candidates: usize, seed: u64, annualization_factor: f64) -> Result<Self, AllocationError> {
        if num_candidates == 0 {
            return Err(AllocationError::InvalidParameters(
                "num_candidates must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            num_candidates,
            seed,
            annualization_factor,
        })
    }

    /// Draws candidate `candidate` for decision `decision_index`.
    pub fn candidate(&self, decision_index: usize, candidate: usize, assets: usize) -> Option<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(mix_seed(self.seed, decision_index as u64));
        rng.set_stream(candidate as u64);

        let raw: Vec<f64> = (0..assets).map(|_| rng.random::<f64>()).collect();
        let total: f64 = raw.iter().sum();
        (total > 0.0).then(|| raw.into_iter().map(|w| w / total).collect())
    }
}

impl WeightSearch for MonteCarloSearch {
    fn search(&self, stats: &ReturnStats, decision_index: usize) -> Result<SearchOutcome, AllocationError> {
        let assets = stats.num_assets();

        let best = (0..self.num_candidates)
            .into_par_iter()
            .filter_map(|index| {
                let weights = self.candidate(decision_index, index, assets)?;
                let sharpe = stats.sharpe(&weights, self.annualization_factor)?;
                Some(Candidate { index, sharpe, weights })
            })
            .reduce_with(Candidate::better)
            .ok_or_else(|| {
                AllocationError::NoFeasiblePortfolio(format!(
                    "none of {} candidates had a defined Sharpe ratio",
                    self.num_candidates
                ))
            })?;

        tracing::debug!(
            decision_index,
            candidate = best.index,
            sharpe = best.sharpe,
            "Monte-Carlo search finished."
        );

        Ok(SearchOutcome {
            weights: best.weights,
            sharpe: best.sharpe,
        })
    }

    fn name(&self) -> &'static str {
        "MonteCarloSearch"
    }
}

/// SplitMix64 finaliser, used to spread `(seed, decision)` over the generator's seed space.
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn mix_seed(seed: u64, decision_index: u64) -> u64 {
    splitmix64(seed ^ splitmix64(decision_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> ReturnStats {
        let a = [100.0, 102.0, 101.0, 104.0, 107.0, 106.0, 110.0];
        let b = [50.0, 49.0, 51.0, 50.5, 50.0, 52.0, 51.0];
        let c = [20.0, 20.5, 20.2, 20.9, 21.0, 21.4, 21.3];
        ReturnStats::from_price_columns(&[&a, &b, &c]).unwrap()
    }

    #[test]
    fn candidates_are_normalised_and_reproducible() {
        let search = MonteCarloSearch::new(10, 7, 252.0).unwrap();
        let first = search.candidate(3, 5, 4).unwrap();
        assert!((first.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(first.iter().all(|w| *w >= 0.0));
        assert_eq!(first, search.candidate(3, 5, 4).unwrap());
        assert_ne!(first, search.candidate(4, 5, 4).unwrap());
        assert_ne!(first, search.candidate(3, 6, 4).unwrap());
    }

    #[test]
    fn same_seed_gives_identical_weights() {
        let stats = stats();
        let a = MonteCarloSearch::new(500, 42, 252.0).unwrap().search(&stats, 30).unwrap();
        let b = MonteCarloSearch::new(500, 42, 252.0).unwrap().search(&stats, 30).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn result_does_not_depend_on_thread_count() {
        let stats = stats();
        let search = MonteCarloSearch::new(400, 11, 252.0).unwrap();
        let single = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(|| search.search(&stats, 9).unwrap());
        let many = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap()
            .install(|| search.search(&stats, 9).unwrap());
        assert_eq!(single, many);
    }

    #[test]
    fn best_candidate_beats_every_other_candidate() {
        let stats = stats();
        let search = MonteCarloSearch::new(200, 3, 252.0).unwrap();
        let outcome = search.search(&stats, 0).unwrap();
        for i in 0..200 {
            let w = search.candidate(0, i, 3).unwrap();
            if let Some(s) = stats.sharpe(&w, 252.0) {
                assert!(s <= outcome.sharpe);
            }
        }
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let a = Candidate { index: 4, sharpe: 1.0, weights: vec![1.0] };
        let b = Candidate { index: 2, sharpe: 1.0, weights: vec![0.5] };
        assert_eq!(Candidate::better(a, b).index, 2);
    }

    #[test]
    fn fails_when_no_candidate_has_risk() {
        let flat = [10.0, 10.0, 10.0, 10.0];
        let stats = ReturnStats::from_price_columns(&[&flat, &flat]).unwrap();
        let search = MonteCarloSearch::new(20, 1, 252.0).unwrap();
        assert!(matches!(
            search.search(&stats, 0),
            Err(AllocationError::NoFeasiblePortfolio(_))
        ));
    }
}
