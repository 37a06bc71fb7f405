use allocation::SignalInputs;
use analytics::{AnalyticsEngine, PerformanceReport};
use anyhow::Context;
use backtester::{BatchRunner, OrderSimulator, RunSummary, ScanReport, SimulationResult};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::{Config, SearchMethod, WeightsConfig};
use core_types::AssetGroup;
use market_data::{load_asset_directory, load_panel_file, load_signal_file, PricePanel};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The main entry point for the portfolio simulator.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; it only supplies SIM_* overrides.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config_from(&cli.config)
        .with_context(|| format!("failed to load configuration from '{}'", cli.config.display()))?;
    let _log_guard = configuration::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Simulate(args) => handle_simulate(args, config).await,
        Commands::Batch(args) => handle_batch(args, config).await,
        Commands::Scan(args) => handle_scan(args, config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Simulates target-weight portfolio rebalancing over historical close prices.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation for one group of assets.
    Simulate(SimulateArgs),
    /// Run independent groups, or a seed/lookback grid of a weight search, in parallel.
    Batch(BatchArgs),
    /// Evaluate random allocations of a group and rank them by Sharpe ratio.
    Scan(ScanArgs),
}

#[derive(Args)]
struct DataArgs {
    /// A JSON panel file holding every asset on one shared index.
    #[arg(long, conflicts_with = "data_dir")]
    panel: Option<PathBuf>,

    /// A directory of per-asset `<SYMBOL>.json` series.
    #[arg(long, requires = "symbols")]
    data_dir: Option<PathBuf>,

    /// Symbols to read from `--data-dir`.
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,
}

#[derive(Parser)]
struct SimulateArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Assets of the cash-sharing group. Defaults to every asset of the panel.
    #[arg(long, value_delimiter = ',')]
    assets: Vec<String>,

    /// Write the full result (snapshots, fills, decisions) as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct BatchArgs {
    #[command(flatten)]
    data: DataArgs,

    /// A group as `NAME=ASSET,ASSET,...`. Repeat for several groups.
    #[arg(long = "group", value_parser = parse_group)]
    groups: Vec<AssetGroup>,

    /// Seeds of the search grid. Together with `--lookbacks` switches to grid mode.
    #[arg(long, value_delimiter = ',')]
    seeds: Vec<u64>,

    /// Lookback windows of the search grid, in steps (0 = all history).
    #[arg(long, value_delimiter = ',')]
    lookbacks: Vec<usize>,

    /// Overrides the configured search method in grid mode.
    #[arg(long, value_enum)]
    method: Option<SearchMethod>,

    /// Write every run summary as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct ScanArgs {
    #[command(flatten)]
    data: DataArgs,

    #[arg(long, value_delimiter = ',')]
    assets: Vec<String>,

    /// Number of random allocations to evaluate.
    #[arg(long, default_value_t = 1000)]
    num_portfolios: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// How many of the best allocations to print.
    #[arg(long, default_value_t = 10)]
    top: usize,

    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_group(value: &str) -> Result<AssetGroup, String> {
    let (name, assets) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=ASSET,ASSET,... but got '{}'", value))?;
    let assets = assets.split(',').map(|a| a.trim().to_string()).collect();
    AssetGroup::new(name.trim(), assets).map_err(|e| e.to_string())
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_simulate(args: SimulateArgs, config: Config) -> anyhow::Result<()> {
    let panel = Arc::new(load_panel(&args.data, &config).await?);
    let group = default_group(&panel, args.assets)?;
    let signals = load_signals(&config, &group, &panel).await?;

    let result = OrderSimulator::from_config(&config, group, Arc::clone(&panel), signals)?.run()?;
    let report = result.performance(&AnalyticsEngine::new(config.analytics.clone()))?;

    print_run(&result, &report);
    if let Some(path) = args.output {
        write_output(&path, &result.to_json()?).await?;
    }
    Ok(())
}

async fn handle_batch(args: BatchArgs, mut config: Config) -> anyhow::Result<()> {
    let panel = Arc::new(load_panel(&args.data, &config).await?);

    let summaries = if !args.seeds.is_empty() || !args.lookbacks.is_empty() {
        let group = match args.groups.as_slice() {
            [] => default_group(&panel, Vec::new())?,
            [group] => group.clone(),
            _ => anyhow::bail!("a search grid runs over exactly one group"),
        };
        if let (Some(method), WeightsConfig::Search(settings)) = (args.method, &mut config.weights) {
            settings.method = method;
        }
        let seeds = if args.seeds.is_empty() { vec![search_seed(&config)] } else { args.seeds };
        let lookbacks = if args.lookbacks.is_empty() { vec![search_lookback(&config)] } else { args.lookbacks };
        BatchRunner::new(config)
            .with_progress(true)
            .run_search_grid(panel, group, &seeds, &lookbacks)?
    } else {
        anyhow::ensure!(!args.groups.is_empty(), "pass at least one --group, or --seeds/--lookbacks for a grid");
        let mut groups = Vec::with_capacity(args.groups.len());
        for group in args.groups {
            let signals = load_signals(&config, &group, &panel).await?;
            groups.push((group, signals));
        }
        BatchRunner::new(config).with_progress(true).run_groups(panel, groups)?
    };

    print_batch(&summaries);
    if let Some(path) = args.output {
        write_output(&path, &serde_json::to_string_pretty(&summaries)?).await?;
    }
    Ok(())
}

async fn handle_scan(args: ScanArgs, config: Config) -> anyhow::Result<()> {
    let panel = Arc::new(load_panel(&args.data, &config).await?);
    let group = default_group(&panel, args.assets)?;

    let report = BatchRunner::new(config)
        .with_progress(true)
        .random_scan(panel, group.clone(), args.num_portfolios, args.seed)?;

    print_scan(&group, &report, args.top);
    if let Some(path) = args.output {
        write_output(&path, &serde_json::to_string_pretty(&report)?).await?;
    }
    Ok(())
}

// ==============================================================================
// Helpers
// ==============================================================================

async fn load_panel(args: &DataArgs, config: &Config) -> anyhow::Result<PricePanel> {
    let gap_policy = config.data.gap_policy;
    match (&args.panel, &args.data_dir) {
        (Some(path), _) => Ok(load_panel_file(path, gap_policy)
            .await
            .with_context(|| format!("failed to load panel '{}'", path.display()))?),
        (None, Some(dir)) => Ok(load_asset_directory(dir, &args.symbols, gap_policy)
            .await
            .with_context(|| format!("failed to load series from '{}'", dir.display()))?),
        (None, None) => anyhow::bail!("pass either --panel or --data-dir"),
    }
}

fn default_group(panel: &PricePanel, assets: Vec<String>) -> anyhow::Result<AssetGroup> {
    let assets = if assets.is_empty() { panel.assets().to_vec() } else { assets };
    Ok(AssetGroup::new("portfolio", assets)?)
}

async fn load_signals(config: &Config, group: &AssetGroup, panel: &PricePanel) -> anyhow::Result<Option<SignalInputs>> {
    let WeightsConfig::Signals { path } = &config.weights else {
        return Ok(None);
    };
    let signals = load_signal_file(path)
        .await
        .with_context(|| format!("failed to load signals '{}'", path.display()))?;
    let (entries, exits) = signals.for_group(group, panel.len())?;
    Ok(Some(SignalInputs { entries, exits }))
}

fn search_seed(config: &Config) -> u64 {
    match &config.weights {
        WeightsConfig::Search(settings) => settings.seed,
        _ => 0,
    }
}

fn search_lookback(config: &Config) -> usize {
    match &config.weights {
        WeightsConfig::Search(settings) => settings.lookback,
        _ => 0,
    }
}

async fn write_output(path: &Path, json: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    tracing::info!(path = %path.display(), "Results written.");
    Ok(())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}

fn print_run(result: &SimulationResult, report: &PerformanceReport) {
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Run".to_string(), result.run_id.to_string()]);
    table.add_row(vec!["Group".to_string(), result.group.assets.join(", ")]);
    table.add_row(vec!["Weight source".to_string(), result.source.clone()]);
    table.add_row(vec!["Steps".to_string(), report.num_steps.to_string()]);
    table.add_row(vec!["Initial equity".to_string(), format!("{:.2}", report.initial_equity)]);
    table.add_row(vec!["Final equity".to_string(), format!("{:.2}", report.final_equity)]);
    table.add_row(vec!["Total return".to_string(), percent(report.total_return)]);
    table.add_row(vec!["Annualized return".to_string(), percent(report.annualized_return)]);
    table.add_row(vec!["Annualized volatility".to_string(), optional(report.annualized_volatility)]);
    table.add_row(vec!["Sharpe ratio".to_string(), optional(report.sharpe_ratio)]);
    table.add_row(vec!["Max drawdown".to_string(), percent(report.max_drawdown)]);
    table.add_row(vec!["Calmar ratio".to_string(), optional(report.calmar_ratio)]);
    table.add_row(vec![
        "Benchmark return".to_string(),
        report.benchmark_return.map_or_else(|| "n/a".to_string(), percent),
    ]);
    table.add_row(vec!["Max / avg exposure".to_string(), format!(
        "{} / {}",
        percent(report.max_exposure),
        percent(report.average_exposure)
    )]);
    table.add_row(vec!["Round trips".to_string(), report.total_trades.to_string()]);
    table.add_row(vec!["Win rate".to_string(), report.win_rate.map_or_else(|| "n/a".to_string(), percent)]);
    table.add_row(vec!["Profit factor".to_string(), optional(report.profit_factor)]);
    table.add_row(vec!["Total fees".to_string(), format!("{:.2}", report.total_fees)]);
    table.add_row(vec!["Rejected orders".to_string(), report.rejected_orders.to_string()]);
    table.add_row(vec![
        "Skipped decisions".to_string(),
        format!("{} of {}", result.skipped_decisions().count(), result.decisions.len()),
    ]);
    table.add_row(vec![
        "Avg holding period".to_string(),
        humantime::format_duration(report.average_holding_period).to_string(),
    ]);
    println!("{table}");
}

fn print_batch(summaries: &[RunSummary]) {
    let mut table = new_table();
    table.set_header(vec!["Run", "Final equity", "Total return", "Sharpe", "Max drawdown", "Fees", "Rejected"]);
    for summary in summaries {
        let report = &summary.report;
        table.add_row(vec![
            summary.label.clone(),
            format!("{:.2}", report.final_equity),
            percent(report.total_return),
            optional(report.sharpe_ratio),
            percent(report.max_drawdown),
            format!("{:.2}", report.total_fees),
            report.rejected_orders.to_string(),
        ]);
    }
    println!("{table}");
}

fn print_scan(group: &AssetGroup, report: &ScanReport, top: usize) {
    let mut table = new_table();
    let mut header = vec!["#".to_string(), "Sharpe".to_string(), "Return".to_string(), "Max DD".to_string()];
    header.extend(group.assets.iter().cloned());
    table.set_header(header);
    for entry in report.entries.iter().take(top) {
        let mut row = vec![
            entry.index.to_string(),
            optional(entry.sharpe_ratio),
            percent(entry.total_return),
            percent(entry.max_drawdown),
        ];
        row.extend(entry.weights.as_slice().iter().map(|w| percent(*w)));
        table.add_row(row);
    }
    println!("{table}");
}
