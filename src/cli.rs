//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::csv_adapter::{CsvAdapter, parse_timestamp};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, DEFAULT_INITIAL_CASH, run_backtest};
use crate::domain::error::RsiTraderError;
use crate::domain::execution::ExecutionPriceRule;
use crate::domain::metrics::MetricsReport;
use crate::domain::strategy::StrategyConfig;
use crate::domain::sweep::{
    ParamGrid, SweepReport, parse_grid_values, parse_period_values, run_sweep,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "rsitrader", about = "RSI strategy backtester")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for equity/trade/metric CSVs (overrides [report] output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        /// Validate and print the plan without loading data
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run a parameter sweep and rank the results
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Number of ranked runs to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Show the data range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List symbols with data for an interval
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        interval: Option<String>,
    },
}

/// Install the stderr log subscriber. `RUST_LOG` wins unless `verbose`.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, symbol.as_deref())
            } else {
                run_backtest_command(&config, output.as_deref(), symbol.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            symbol,
            top,
        } => run_sweep_command(&config, symbol.as_deref(), top),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::ListSymbols { config, interval } => run_list_symbols(&config, interval.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RsiTraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// `[data]` section: where bars come from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub path: PathBuf,
    pub symbol: String,
    pub interval: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

pub fn build_data_settings(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
) -> Result<DataSettings, RsiTraderError> {
    let path = config
        .get_string("data", "path")
        .ok_or_else(|| RsiTraderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    let symbol = symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("data", "symbol"))
        .unwrap_or_else(|| "BTCUSDT".to_string())
        .to_uppercase();
    let interval = config
        .get_string("data", "interval")
        .unwrap_or_else(|| "4h".to_string());

    let timestamp = |key: &str| -> Result<Option<NaiveDateTime>, RsiTraderError> {
        match config.get_string("data", key) {
            None => Ok(None),
            Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
                RsiTraderError::invalid("data", key, format!("unrecognized timestamp '{raw}'"))
            }),
        }
    };
    let start = timestamp("start")?;
    let end = timestamp("end")?;
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(RsiTraderError::invalid("data", "end", "end is before start"));
        }
    }

    Ok(DataSettings {
        path: PathBuf::from(path),
        symbol,
        interval,
        start,
        end,
    })
}

fn read_enum<T: std::str::FromStr<Err = String>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, RsiTraderError> {
    config
        .get_string(section, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|reason| RsiTraderError::invalid(section, key, reason))
        })
        .transpose()
}

/// `[strategy]` section, unvalidated. Missing keys take the defaults.
pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, RsiTraderError> {
    const S: &str = "strategy";
    let defaults = StrategyConfig::default();
    let variant = read_enum(config, S, "kind")?.unwrap_or(defaults.variant);

    Ok(StrategyConfig {
        name: config
            .get_string(S, "name")
            .unwrap_or_else(|| variant.to_string()),
        variant,
        rsi_period: config
            .get_usize(S, "rsi_period")?
            .unwrap_or(defaults.rsi_period),
        rsi_source: read_enum(config, S, "rsi_source")?.unwrap_or(defaults.rsi_source),
        sma_period: config
            .get_usize(S, "sma_period")?
            .unwrap_or(defaults.sma_period),
        atr_period: config
            .get_usize(S, "atr_period")?
            .unwrap_or(defaults.atr_period),
        buy_threshold: config
            .get_f64(S, "buy_threshold")?
            .unwrap_or(defaults.buy_threshold),
        sell_threshold: config
            .get_f64(S, "sell_threshold")?
            .unwrap_or(defaults.sell_threshold),
        trigger: read_enum(config, S, "trigger")?.unwrap_or(defaults.trigger),
        atr_stop_multiplier: config
            .get_f64(S, "atr_stop_multiplier")?
            .unwrap_or(defaults.atr_stop_multiplier),
        atr_take_profit_multiplier: config
            .get_f64(S, "atr_take_profit_multiplier")?
            .unwrap_or(defaults.atr_take_profit_multiplier),
    })
}

/// `[backtest]` section, unvalidated.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, RsiTraderError> {
    const S: &str = "backtest";
    Ok(BacktestConfig {
        initial_cash: config
            .get_f64(S, "initial_cash")?
            .unwrap_or(DEFAULT_INITIAL_CASH),
        transaction_cost: config.get_f64(S, "transaction_cost")?.unwrap_or(0.0),
        execution_price: read_enum::<ExecutionPriceRule>(config, S, "execution_price")?
            .unwrap_or_default(),
        risk_free_rate: config.get_f64(S, "risk_free_rate")?.unwrap_or(0.0),
        annualization_factor: config.get_f64(S, "annualization_factor")?,
    })
}

/// `[sweep]` section. Keys left out hold the base strategy's value; with no
/// `[sweep]` keys at all the default threshold/SMA grid is used.
pub fn build_param_grid(
    config: &dyn ConfigPort,
    base: &StrategyConfig,
) -> Result<ParamGrid, RsiTraderError> {
    const S: &str = "sweep";
    let keys = ["buy_thresholds", "sell_thresholds", "sma_periods", "rsi_periods"];
    if keys.iter().all(|k| config.get_string(S, k).is_none()) {
        return Ok(ParamGrid::threshold_default(base));
    }

    let mut grid = ParamGrid::from_base(base);
    let invalid = |key: &str, reason: String| RsiTraderError::invalid(S, key, reason);
    if let Some(raw) = config.get_string(S, "buy_thresholds") {
        grid.buy_thresholds =
            parse_grid_values(&raw).map_err(|r| invalid("buy_thresholds", r))?;
    }
    if let Some(raw) = config.get_string(S, "sell_thresholds") {
        grid.sell_thresholds =
            parse_grid_values(&raw).map_err(|r| invalid("sell_thresholds", r))?;
    }
    if let Some(raw) = config.get_string(S, "sma_periods") {
        grid.sma_periods = parse_period_values(&raw).map_err(|r| invalid("sma_periods", r))?;
    }
    if let Some(raw) = config.get_string(S, "rsi_periods") {
        grid.rsi_periods = parse_period_values(&raw).map_err(|r| invalid("rsi_periods", r))?;
    }
    grid.validate()?;
    Ok(grid)
}

struct Settings {
    strategy: StrategyConfig,
    backtest: BacktestConfig,
    data: DataSettings,
}

fn load_settings(
    config_path: &Path,
    symbol: Option<&str>,
) -> Result<(FileConfigAdapter, Settings), RsiTraderError> {
    let adapter = load_config(config_path)?;
    let strategy = build_strategy_config(&adapter)?;
    strategy.validate()?;
    let backtest = build_backtest_config(&adapter)?;
    backtest.validate()?;
    let data = build_data_settings(&adapter, symbol)?;
    Ok((
        adapter,
        Settings {
            strategy,
            backtest,
            data,
        },
    ))
}

fn fetch(settings: &DataSettings) -> Result<Vec<crate::domain::ohlcv::Bar>, RsiTraderError> {
    let port = CsvAdapter::new(settings.path.clone());
    info!(symbol = %settings.symbol, interval = %settings.interval, "loading bars");
    let bars = port.fetch_bars(
        &settings.symbol,
        &settings.interval,
        settings.start,
        settings.end,
    )?;
    info!(bars = bars.len(), "bars loaded");
    Ok(bars)
}

fn run_backtest_command(
    config_path: &Path,
    output: Option<&Path>,
    symbol: Option<&str>,
) -> Result<(), RsiTraderError> {
    let (adapter, settings) = load_settings(config_path, symbol)?;
    let bars = fetch(&settings.data)?;

    info!(strategy = %settings.strategy.name, "running backtest");
    let result = run_backtest(&bars, &settings.strategy, &settings.backtest)?;

    println!(
        "=== {} on {} ({}) ===",
        settings.strategy.name, settings.data.symbol, settings.data.interval
    );
    print!("{}", format_summary(&result.metrics));

    let output_dir = output
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("report", "output_dir").map(PathBuf::from));
    if let Some(dir) = output_dir {
        CsvReportAdapter.write(&result, &settings.strategy, &dir.to_string_lossy())?;
        println!("\nReport written to: {}", dir.display());
    }
    Ok(())
}

pub fn run_dry_run(config_path: &Path, symbol: Option<&str>) -> Result<(), RsiTraderError> {
    let (_, settings) = load_settings(config_path, symbol)?;
    let s = &settings.strategy;
    let spec = s.indicator_spec();

    println!("Configuration is valid\n");
    println!("Strategy: {} ({})", s.name, s.variant);
    println!(
        "  entry: RSI > {} ({}), exit: RSI < {}",
        s.buy_threshold, s.trigger, s.sell_threshold
    );
    println!("\nIndicators:");
    for indicator in spec.types() {
        println!("  {indicator} (needs {} bars)", indicator.required_bars());
    }
    println!("  minimum bars: {}", spec.minimum_bars());
    println!("\nData:");
    println!(
        "  {}/{}_{}.csv",
        settings.data.path.display(),
        settings.data.symbol,
        settings.data.interval
    );
    println!("\nAccount:");
    println!("  initial cash:     {:.2}", settings.backtest.initial_cash);
    println!("  transaction cost: {}", settings.backtest.transaction_cost);
    println!("  execution price:  {}", settings.backtest.execution_price);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), RsiTraderError> {
    let (adapter, settings) = load_settings(config_path, None)?;
    let grid = build_param_grid(&adapter, &settings.strategy)?;
    println!(
        "Configuration is valid: {} ({}), sweep grid of {} combinations",
        settings.strategy.name,
        settings.strategy.variant,
        grid.generate_configs(&settings.strategy).len()
    );
    Ok(())
}

fn run_sweep_command(
    config_path: &Path,
    symbol: Option<&str>,
    top: usize,
) -> Result<(), RsiTraderError> {
    let (adapter, settings) = load_settings(config_path, symbol)?;
    let grid = build_param_grid(&adapter, &settings.strategy)?;
    let bars = fetch(&settings.data)?;

    let report = run_sweep(&bars, &grid, &settings.strategy, &settings.backtest)?;
    print!("{}", format_sweep(&report, top));
    Ok(())
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), RsiTraderError> {
    let adapter = load_config(config_path)?;
    let data = build_data_settings(&adapter, symbol)?;
    let port = CsvAdapter::new(data.path.clone());

    match port.get_data_range(&data.symbol, &data.interval)? {
        Some((first, last, count)) => println!(
            "{} {}: {count} bars, {first} to {last}",
            data.symbol, data.interval
        ),
        None => println!("{} {}: no data found", data.symbol, data.interval),
    }
    Ok(())
}

fn run_list_symbols(config_path: &Path, interval: Option<&str>) -> Result<(), RsiTraderError> {
    let adapter = load_config(config_path)?;
    let data = build_data_settings(&adapter, None)?;
    let interval = interval.map_or(data.interval, str::to_string);
    let port = CsvAdapter::new(data.path);

    let symbols = port.list_symbols(&interval)?;
    if symbols.is_empty() {
        eprintln!("No symbols found for interval {interval}");
    } else {
        for symbol in &symbols {
            println!("{symbol}");
        }
        info!(count = symbols.len(), "symbols listed");
    }
    Ok(())
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

pub fn format_summary(m: &MetricsReport) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: String| {
        out.push_str(&format!("{label:<18}{value}\n"));
    };
    line("Initial Cash:", format!("{:.2}", m.initial_cash));
    line("Final Equity:", format!("{:.2}", m.final_equity));
    line("Total Return:", pct(Some(m.total_return)));
    line("Annualized:", pct(m.annualized_return));
    line("Buy & Hold:", pct(m.buy_and_hold_return));
    line("Sharpe Ratio:", ratio(m.sharpe_ratio));
    line("Sortino Ratio:", ratio(m.sortino_ratio));
    let span = match (m.drawdown.peak, m.drawdown.trough) {
        (Some(peak), Some(trough)) => format!(" ({peak} to {trough})"),
        _ => String::new(),
    };
    line(
        "Max Drawdown:",
        format!("-{:.2}%{span}", m.drawdown.max_drawdown * 100.0),
    );
    line("Trades:", format!("{} ({} closed at end of data)", m.trade_count, m.synthetic_exits));
    line("Win Rate:", pct(m.win_rate));
    line("Profit Factor:", ratio(m.profit_factor));
    line("Exposure:", pct(Some(m.exposure)));
    out
}

pub fn format_sweep(report: &SweepReport, top: usize) -> String {
    let mut out = format!(
        "{:<4}{:>8}{:>8}{:>6}{:>6}{:>12}{:>10}{:>10}{:>8}\n",
        "#", "buy", "sell", "sma", "rsi", "return", "sharpe", "max dd", "trades"
    );
    for (rank, entry) in report.ranked.iter().take(top).enumerate() {
        let (s, m) = (&entry.strategy, &entry.metrics);
        out.push_str(&format!(
            "{:<4}{:>8}{:>8}{:>6}{:>6}{:>12}{:>10}{:>10}{:>8}\n",
            rank + 1,
            s.buy_threshold,
            s.sell_threshold,
            s.sma_period,
            s.rsi_period,
            pct(Some(m.total_return)),
            ratio(m.sharpe_ratio),
            format!("{:.2}%", m.drawdown.max_drawdown * 100.0),
            m.trade_count,
        ));
    }
    out.push_str(&format!(
        "\n{} runs completed, {} skipped\n",
        report.ranked.len(),
        report.skipped.len()
    ));
    for skipped in &report.skipped {
        out.push_str(&format!("  skipped {}: {}\n", skipped.strategy.name, skipped.reason));
    }
    out
}
