use crate::error::SimulationError;
use crate::result::SimulationResult;
use crate::simulator::OrderSimulator;
use allocation::{FixedWeights, MonteCarloSearch, RebalanceSchedule, SignalInputs};
use analytics::{AnalyticsEngine, PerformanceReport};
use configuration::{Config, WeightsConfig};
use core_types::{AssetGroup, WeightVector};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use market_data::PricePanel;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// One finished run of a batch and its performance.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub label: String,
    pub result: SimulationResult,
    pub report: PerformanceReport,
}

/// One random allocation evaluated by [`BatchRunner::random_scan`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEntry {
    pub index: usize,
    pub weights: WeightVector,
    pub sharpe_ratio: Option<f64>,
    pub total_return: f64,
    pub max_drawdown: f64,
}

/// Random allocations ranked best first by Sharpe ratio.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn best(&self) -> Option<&ScanEntry> {
        self.entries.first()
    }
}

/// Runs independent simulations in parallel.
///
/// Every run owns its `PortfolioState` and fill log; only the price panel is shared,
/// read-only. Results come back in submission order whatever the thread count.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: Config,
    threads: usize,
    show_progress: bool,
}

impl BatchRunner {
    pub fn new(config: Config) -> Self {
        let threads = config.parallelism.threads;
        Self {
            config,
            threads,
            show_progress: false,
        }
    }

    /// Shows a progress bar on stderr while runs execute.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn pool(&self) -> Result<rayon::ThreadPool, SimulationError> {
        let threads = if self.threads == 0 { num_cpus::get() } else { self.threads };
        Ok(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?)
    }

    fn progress_bar(&self, len: usize) -> Result<ProgressBar, SimulationError> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let progress_bar = ProgressBar::new(len as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("=>-"),
        );
        Ok(progress_bar)
    }

    fn run_one(
        config: &Config,
        group: AssetGroup,
        panel: Arc<PricePanel>,
        signals: Option<SignalInputs>,
        label: String,
    ) -> Result<RunSummary, SimulationError> {
        let result = OrderSimulator::from_config(config, group, panel, signals)?.run()?;
        let report = result.performance(&AnalyticsEngine::new(config.analytics.clone()))?;
        Ok(RunSummary { label, result, report })
    }

    /// Simulates several independent groups over the same panel.
    pub fn run_groups(
        &self,
        panel: Arc<PricePanel>,
        groups: Vec<(AssetGroup, Option<SignalInputs>)>,
    ) -> Result<Vec<RunSummary>, SimulationError> {
        tracing::info!(groups = groups.len(), "Starting batch of independent groups.");
        let progress_bar = self.progress_bar(groups.len())?;

        let summaries = self.pool()?.install(|| {
            groups
                .into_par_iter()
                .map(|(group, signals)| {
                    let label = group.name.clone();
                    let summary = Self::run_one(&self.config, group, Arc::clone(&panel), signals, label);
                    progress_bar.inc(1);
                    summary
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        progress_bar.finish_with_message("Batch complete.");
        Ok(summaries)
    }

    /// Simulates one group for every `(seed, lookback)` pair of a weight search.
    pub fn run_search_grid(
        &self,
        panel: Arc<PricePanel>,
        group: AssetGroup,
        seeds: &[u64],
        lookbacks: &[usize],
    ) -> Result<Vec<RunSummary>, SimulationError> {
        let WeightsConfig::Search(base) = &self.config.weights else {
            return Err(SimulationError::InvalidParameters(
                "a search grid needs `weights.type = \"search\"`".to_string(),
            ));
        };

        let jobs: Vec<(String, Config)> = seeds
            .iter()
            .cartesian_product(lookbacks.iter())
            .map(|(seed, lookback)| {
                let mut config = self.config.clone();
                let mut settings = base.clone();
                settings.seed = *seed;
                settings.lookback = *lookback;
                config.weights = WeightsConfig::Search(settings);
                (format!("seed={} lookback={}", seed, lookback), config)
            })
            .collect();

        tracing::info!(runs = jobs.len(), group = %group.name, "Starting search grid.");
        let progress_bar = self.progress_bar(jobs.len())?;

        let summaries = self.pool()?.install(|| {
            jobs.into_par_iter()
                .map(|(label, config)| {
                    let summary = Self::run_one(&config, group.clone(), Arc::clone(&panel), None, label);
                    progress_bar.inc(1);
                    summary
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        progress_bar.finish_with_message("Search grid complete.");
        Ok(summaries)
    }

    /// Evaluates `num_portfolios` seeded random allocations under the configured
    /// rebalance policy and ranks them by Sharpe ratio.
    pub fn random_scan(
        &self,
        panel: Arc<PricePanel>,
        group: AssetGroup,
        num_portfolios: usize,
        seed: u64,
    ) -> Result<ScanReport, SimulationError> {
        let generator = MonteCarloSearch::new(
            num_portfolios,
            seed,
            f64::from(self.config.analytics.annualization_factor),
        )?;
        let engine = AnalyticsEngine::new(self.config.analytics.clone());
        let schedule = RebalanceSchedule::from_policy(&self.config.rebalance);
        let progress_bar = self.progress_bar(num_portfolios)?;

        let mut entries = self.pool()?.install(|| {
            (0..num_portfolios)
                .into_par_iter()
                .filter_map(|index| generator.candidate(0, index, group.len()).map(|w| (index, w)))
                .map(|(index, weights)| -> Result<ScanEntry, SimulationError> {
                    let weights = WeightVector::new(weights);
                    let source = Box::new(FixedWeights::new(weights.clone()));
                    let simulator = OrderSimulator::new(
                        group.clone(),
                        Arc::clone(&panel),
                        self.config.simulation.clone(),
                        schedule,
                        source,
                    )?;
                    let report = simulator.run()?.performance(&engine)?;
                    progress_bar.inc(1);
                    Ok(ScanEntry {
                        index,
                        weights,
                        sharpe_ratio: report.sharpe_ratio,
                        total_return: report.total_return,
                        max_drawdown: report.max_drawdown,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        entries.sort_by(rank);
        progress_bar.finish_with_message("Scan complete.");
        if let Some(best) = entries.first() {
            tracing::info!(
                index = best.index,
                sharpe = ?best.sharpe_ratio,
                weights = ?best.weights.as_slice(),
                "Best random allocation."
            );
        }
        Ok(ScanReport { entries })
    }
}

/// Highest Sharpe first, undefined Sharpe last, ties to the lowest index.
fn rank(a: &ScanEntry, b: &ScanEntry) -> Ordering {
    match (a.sharpe_ratio, b.sharpe_ratio) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then(a.index.cmp(&b.index))
}
