//! EdgeLab CLI: train, predict, backtest, sweep and cache management.
//!
//! Commands:
//! - `train`: fetch candles, fit the direction classifier, save it
//! - `predict`: probability of an up move for the latest candle
//! - `backtest`: run the strategy on model probabilities, print the summary
//! - `sweep`: evaluate a threshold/cost grid on one set of predictions
//! - `cache status` / `cache clean`: inspect or prune the response cache
//!
//! Every command reads an optional TOML config; flags override it and the
//! result is validated again before anything runs.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use edgelab_core::data::{CacheStatus, OkxClient, ResponseCache};
use edgelab_runner::{
    predict_pipeline, prepare_backtest_inputs, run_backtest_with_probabilities, run_sweep,
    save_artifacts, train_pipeline, write_equity, AppConfig, DataSourceOptions, SweepGrid,
};

#[derive(Parser)]
#[command(
    name = "edgelab",
    about = "EdgeLab CLI: directional prediction and cost-aware backtesting for crypto candles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch candles, train the classifier and save it.
    Train {
        #[command(flatten)]
        market: MarketArgs,
    },
    /// Probability of an up move over the horizon for the latest candle.
    Predict {
        #[command(flatten)]
        market: MarketArgs,
    },
    /// Backtest the strategy on model probabilities.
    Backtest {
        #[command(flatten)]
        market: MarketArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        /// Write the equity curve here (.parquet for Parquet, otherwise CSV).
        #[arg(long)]
        equity_out: Option<PathBuf>,

        /// Directory for the full artifact set. Defaults to [backtest].output_dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Evaluate a grid of thresholds and costs on one set of predictions.
    Sweep {
        #[command(flatten)]
        market: MarketArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        /// Long thresholds, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [0.50, 0.55, 0.60, 0.65])]
        long_grid: Vec<f64>,

        /// Short thresholds, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [0.35, 0.40, 0.45, 0.50])]
        short_grid: Vec<f64>,

        /// Fee levels in bps, comma separated. Defaults to the configured fee.
        #[arg(long, value_delimiter = ',')]
        fee_grid: Vec<f64>,

        /// Slippage levels in bps, comma separated. Defaults to the configured slippage.
        #[arg(long, value_delimiter = ',')]
        slip_grid: Vec<f64>,

        /// Number of best points to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Response cache management commands.
    Cache {
        /// Path to a TOML config file (for [cache] settings).
        #[arg(long, global = true)]
        config: Option<PathBuf>,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report entry count, expired/corrupt entries and total size.
    Status,
    /// Remove expired and corrupt entries.
    Clean {
        /// Remove entries older than this many seconds instead of the TTL.
        #[arg(long, conflicts_with = "all")]
        older_than: Option<u64>,

        /// Remove every entry.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

/// Market, model and data-source flags shared by all pipeline commands.
#[derive(Args)]
struct MarketArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instrument id, e.g. BTC-USDT.
    #[arg(long)]
    inst: Option<String>,

    /// Bar size, e.g. 1m, 5m, 1H.
    #[arg(long)]
    bar: Option<String>,

    /// Prediction horizon in minutes.
    #[arg(long)]
    horizon: Option<u32>,

    /// Number of candles to fetch.
    #[arg(long)]
    limit: Option<usize>,

    /// Fall back to synthetic candles when real data is unavailable.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Offline mode: serve candles from the cache only.
    #[arg(long, default_value_t = false)]
    offline: bool,
}

/// Strategy and cost overrides.
#[derive(Args)]
struct StrategyArgs {
    /// Go long when P(up) is above this.
    #[arg(long)]
    thr_long: Option<f64>,

    /// Go short when P(up) is below this.
    #[arg(long)]
    thr_short: Option<f64>,

    /// Initial capital.
    #[arg(long)]
    initial: Option<f64>,

    /// Fee per position change, in bps.
    #[arg(long)]
    fee_bps: Option<f64>,

    /// Slippage per position change, in bps.
    #[arg(long)]
    slip_bps: Option<f64>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train { market } => run_train(&market),
        Commands::Predict { market } => run_predict(&market),
        Commands::Backtest {
            market,
            strategy,
            equity_out,
            output_dir,
        } => run_backtest_cmd(&market, &strategy, equity_out, output_dir),
        Commands::Sweep {
            market,
            strategy,
            long_grid,
            short_grid,
            fee_grid,
            slip_grid,
            top,
        } => {
            let grid = SweepGrid {
                thr_short: short_grid,
                thr_long: long_grid,
                fee_bps: fee_grid,
                slippage_bps: slip_grid,
            };
            run_sweep_cmd(&market, &strategy, grid, top)
        }
        Commands::Cache { config, action } => {
            let config = load_config(config.as_ref())?;
            let cache = ResponseCache::new(&config.cache.dir, config.cache.ttl());
            match action {
                CacheAction::Status => run_cache_status(&cache),
                CacheAction::Clean { older_than, all } => {
                    let limit = if all {
                        None
                    } else {
                        Some(older_than.map_or(cache.ttl(), Duration::from_secs))
                    };
                    run_cache_clean(&cache, limit)
                }
            }
        }
    }
}

/// Logs go to stderr so stdout carries only the JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ── Configuration ────────────────────────────────────────────────────

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn apply_market(config: &mut AppConfig, args: &MarketArgs) {
    if let Some(inst) = &args.inst {
        config.market.inst = inst.clone();
    }
    if let Some(bar) = &args.bar {
        config.market.bar = bar.clone();
    }
    if let Some(horizon) = args.horizon {
        config.model.horizon_minutes = horizon;
    }
    if let Some(limit) = args.limit {
        config.market.limit = limit;
    }
}

fn apply_strategy(config: &mut AppConfig, args: &StrategyArgs) {
    if let Some(v) = args.thr_long {
        config.strategy.thr_long = v;
    }
    if let Some(v) = args.thr_short {
        config.strategy.thr_short = v;
    }
    if let Some(v) = args.initial {
        config.backtest.initial_capital = v;
    }
    if let Some(v) = args.fee_bps {
        config.costs.fee_bps = v;
    }
    if let Some(v) = args.slip_bps {
        config.costs.slippage_bps = v;
    }
}

fn resolve_config(market: &MarketArgs, strategy: Option<&StrategyArgs>) -> Result<AppConfig> {
    let mut config = load_config(market.config.as_ref())?;
    apply_market(&mut config, market);
    if let Some(strategy) = strategy {
        apply_strategy(&mut config, strategy);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn okx_client(config: &AppConfig, offline: bool) -> Result<OkxClient> {
    let cache = ResponseCache::new(&config.cache.dir, config.cache.ttl());
    let client = OkxClient::new(config.okx.clone(), cache).context("failed to set up OKX client")?;
    Ok(client.cache_only(offline))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Commands ─────────────────────────────────────────────────────────

fn run_train(market: &MarketArgs) -> Result<()> {
    let config = resolve_config(market, None)?;
    let client = okx_client(&config, market.offline)?;
    let source = DataSourceOptions {
        provider: Some(&client),
        synthetic: market.synthetic,
    };

    let outcome = train_pipeline(&config, source)?;
    if outcome.has_synthetic {
        warn!("model trained on SYNTHETIC data");
    }
    print_json(&outcome)
}

fn run_predict(market: &MarketArgs) -> Result<()> {
    let config = resolve_config(market, None)?;
    let client = okx_client(&config, market.offline)?;
    let source = DataSourceOptions {
        provider: Some(&client),
        synthetic: market.synthetic,
    };

    let prediction = predict_pipeline(&config, source)?;
    print_json(&prediction)
}

fn run_backtest_cmd(
    market: &MarketArgs,
    strategy: &StrategyArgs,
    equity_out: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = resolve_config(market, Some(strategy))?;
    let client = okx_client(&config, market.offline)?;
    let source = DataSourceOptions {
        provider: Some(&client),
        synthetic: market.synthetic,
    };

    let inputs = prepare_backtest_inputs(&config, source)?;
    let result = run_backtest_with_probabilities(
        &inputs.features,
        &inputs.probabilities,
        &config,
        &inputs.dataset_hash,
        inputs.has_synthetic,
    )?;

    print_json(&result.summary())?;
    if result.has_synthetic {
        warn!("results based on SYNTHETIC data");
    }

    if let Some(path) = equity_out {
        write_equity(&path, &result.equity)?;
        eprintln!("Equity curve saved to: {}", path.display());
    }

    let output_dir = output_dir.unwrap_or_else(|| config.backtest.output_dir.clone());
    let run_dir = save_artifacts(&result, &output_dir)?;
    eprintln!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_sweep_cmd(
    market: &MarketArgs,
    strategy: &StrategyArgs,
    mut grid: SweepGrid,
    top: usize,
) -> Result<()> {
    let config = resolve_config(market, Some(strategy))?;
    let params = config.strategy_params()?;
    if grid.fee_bps.is_empty() {
        grid.fee_bps = vec![params.costs.fee_bps()];
    }
    if grid.slippage_bps.is_empty() {
        grid.slippage_bps = vec![params.costs.slippage_bps()];
    }

    let client = okx_client(&config, market.offline)?;
    let source = DataSourceOptions {
        provider: Some(&client),
        synthetic: market.synthetic,
    };
    let inputs = prepare_backtest_inputs(&config, source)?;
    let results = run_sweep(&inputs.features, &inputs.probabilities, &params, &grid)?;

    if results.skipped() > 0 {
        eprintln!("Skipped {} invalid grid point(s)", results.skipped());
    }
    print_json(&results.top_n(top))
}

fn run_cache_status(cache: &ResponseCache) -> Result<()> {
    let status: CacheStatus = cache.status()?;
    if status.entries == 0 {
        println!("Cache is empty: {}", status.root.display());
        return Ok(());
    }

    println!("Cache:      {}", status.root.display());
    println!("TTL:        {}s", cache.ttl().as_secs());
    println!("Entries:    {}", status.entries);
    println!("Expired:    {}", status.expired);
    println!("Corrupt:    {}", status.corrupt);
    println!("Total size: {}", format_size(status.total_bytes));
    Ok(())
}

fn run_cache_clean(cache: &ResponseCache, older_than: Option<Duration>) -> Result<()> {
    let removed = cache.clean(older_than)?;
    match older_than {
        Some(limit) => println!(
            "Removed {removed} entr{} older than {}s (or corrupt).",
            if removed == 1 { "y" } else { "ies" },
            limit.as_secs()
        ),
        None => println!("Removed {removed} entr{}.", if removed == 1 { "y" } else { "ies" }),
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
