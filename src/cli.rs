//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::{CsvAdapter, read_security_names};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult, DEFAULT_HORIZONS};
use crate::domain::config_validation::{
    check_band, read_bool, read_f64, read_usize, read_usize_list, validate_all,
};
use crate::domain::error::RevscanError;
use crate::domain::indicator::WindowConfig;
use crate::domain::scan::{self, ScanResult};
use crate::domain::signal::{
    BUILTIN_PROFILES, Band, BreakoutFilter, FilterProfile, MacdFilter,
};
use crate::domain::summary::GapBucket;
use crate::domain::trade::{ExitPolicy, LifeLine};
use crate::domain::universe::{self, SecurityNames, Universe, parse_codes, parse_prefixes};
use crate::domain::worker_pool::{WorkerPool, default_workers};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::series_source::SeriesSource;

pub const DEFAULT_PROFILE: &str = "oversold_reversal";
pub const DEFAULT_TRADES_PATH: &str = "backtest_trades.csv";

#[derive(Parser, Debug)]
#[command(
    name = "revscan",
    about = "Oversold-reversal signal scanner and exit-policy backtester"
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a filter profile over every series in the data directory
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        workers: Option<usize>,
        /// Trade log path
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List securities whose latest bar passes the filter profile
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        profile: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the built-in filter profiles
    Profiles,
}

pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(&cli.log_level);

    let result = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            profile,
            workers,
            output,
            dry_run,
        } => {
            let overrides = Overrides {
                data_dir,
                profile,
                workers,
                output,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_backtest(&config, &overrides)
            }
        }
        Command::Scan {
            config,
            data_dir,
            profile,
            output,
        } => run_scan(
            &config,
            &Overrides {
                data_dir,
                profile,
                workers: None,
                output,
            },
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Profiles => {
            run_profiles();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub profile: Option<String>,
    pub workers: Option<usize>,
    pub output: Option<PathBuf>,
}

/// Immutable run settings built once from the config file.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub profile: FilterProfile,
    pub policy: ExitPolicy,
    pub backtest: BacktestConfig,
    pub data_dir: PathBuf,
    pub codes: Option<Vec<String>>,
    pub prefixes: Vec<String>,
    pub names: SecurityNames,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RevscanError> {
    info!("loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn build_settings(
    adapter: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<RunSettings, RevscanError> {
    validate_all(adapter)?;
    Ok(RunSettings {
        profile: build_filter_profile(adapter, overrides.profile.as_deref())?,
        policy: build_exit_policy(adapter)?,
        backtest: build_backtest_config(adapter, overrides.workers)?,
        data_dir: resolve_data_dir(overrides.data_dir.as_ref(), adapter)?,
        codes: resolve_codes(adapter)?,
        prefixes: adapter
            .get_string("backtest", "code_prefixes")
            .map(|p| parse_prefixes(&p))
            .unwrap_or_default(),
        names: load_names(adapter)?,
    })
}

/// Security names from `[backtest] names_path`, empty when unset.
pub fn load_names(adapter: &dyn ConfigPort) -> Result<SecurityNames, RevscanError> {
    match adapter.get_string("backtest", "names_path") {
        Some(path) if !path.trim().is_empty() => {
            let names = read_security_names(Path::new(path.trim()))?;
            info!("loaded {} security names", names.len());
            Ok(names)
        }
        _ => Ok(SecurityNames::default()),
    }
}

pub fn build_windows(adapter: &dyn ConfigPort) -> Result<WindowConfig, RevscanError> {
    let defaults = WindowConfig::default();
    let window = |key: &str, default: usize| -> Result<usize, RevscanError> {
        Ok(read_usize(adapter, "signal", key)?.unwrap_or(default))
    };
    Ok(WindowConfig {
        rsi_period: window("rsi_period", defaults.rsi_period)?,
        kdj_window: window("kdj_window", defaults.kdj_window)?,
        turnover_window: window("turnover_window", defaults.turnover_window)?,
        volume_window: window("volume_window", defaults.volume_window)?,
        breakout_window: window("breakout_window", defaults.breakout_window)?,
        ..defaults
    })
}

/// Replace whichever bounds are configured, keeping the rest of `current`.
fn override_band(current: Option<Band>, min: Option<f64>, max: Option<f64>) -> Option<Band> {
    if min.is_none() && max.is_none() {
        return current;
    }
    let mut band = current.unwrap_or(Band {
        min: None,
        max: None,
        strict: false,
    });
    if min.is_some() {
        band.min = min;
    }
    if max.is_some() {
        band.max = max;
    }
    Some(band)
}

pub fn build_filter_profile(
    adapter: &dyn ConfigPort,
    profile_override: Option<&str>,
) -> Result<FilterProfile, RevscanError> {
    let name = profile_override
        .map(str::to_string)
        .or_else(|| adapter.get_string("signal", "profile"))
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let mut p = FilterProfile::builtin(&name).ok_or(RevscanError::UnknownProfile { name })?;

    let num = |key: &str| read_f64(adapter, "signal", key);
    let flag = |key: &str| read_bool(adapter, "signal", key);

    p.price = override_band(p.price, num("min_price")?, num("max_price")?);
    p.momentum.rsi = override_band(p.momentum.rsi, num("min_rsi")?, num("max_rsi")?);
    p.momentum.kdj_k = override_band(p.momentum.kdj_k, num("min_kdj_k")?, num("max_kdj_k")?);
    p.bias = override_band(p.bias, num("min_bias")?, num("max_bias")?);
    p.volume.ratio = override_band(
        p.volume.ratio,
        num("min_volume_ratio")?,
        num("max_volume_ratio")?,
    );

    if let Some(v) = num("max_avg_turnover")? {
        p.liquidity.max_avg_turnover = Some(v);
    }
    if let Some(v) = num("min_amount")? {
        p.liquidity.min_amount = Some(v);
    }
    if let Some(v) = flag("kdj_golden_cross")? {
        p.momentum.kdj_golden_cross = v;
    }
    if let Some(v) = num("stand_still_ratio")? {
        p.stabilization.stand_still_ratio = Some(v);
    }
    if let Some(v) = flag("require_ma5_slowing")? {
        p.stabilization.require_ma5_slowing = v;
    }
    if let Some(v) = flag("require_volume_increase")? {
        p.volume.require_increase = v;
    }
    if let Some(v) = flag("require_obv_rising")? {
        p.volume.require_obv_rising = v;
    }
    if let Some(v) = flag("require_ma_alignment")? {
        p.trend.require_ma_alignment = v;
    }
    if let Some(v) = flag("require_ma5_rising")? {
        p.trend.require_ma5_rising = v;
    }
    if let Some(v) = flag("require_above_ma20")? {
        p.trend.require_above_ma20 = v;
    }
    if let Some(margin) = num("breakout_margin")? {
        let require_up_candle = p.breakout.as_ref().is_none_or(|b| b.require_up_candle);
        p.breakout = Some(BreakoutFilter {
            margin,
            require_up_candle,
        });
    }

    let min_dif = num("min_dif")?;
    let hist_acceleration = num("hist_acceleration")?;
    let above_dif_trend = flag("above_dif_trend")?;
    if min_dif.is_some() || hist_acceleration.is_some() || above_dif_trend.is_some() {
        let macd = p.macd.get_or_insert_with(MacdFilter::default);
        if min_dif.is_some() {
            macd.min_dif = min_dif;
        }
        if hist_acceleration.is_some() {
            macd.min_hist_acceleration = hist_acceleration;
        }
        if let Some(v) = above_dif_trend {
            macd.above_dif_trend = v;
        }
    }

    if let Some(v) = num("min_profit_potential")? {
        p.min_profit_potential = Some(v);
    }
    if let Some(v) = num("max_today_change")? {
        p.max_today_change = Some(v);
    }

    for (key, band) in [
        ("min_price", p.price),
        ("min_rsi", p.momentum.rsi),
        ("min_kdj_k", p.momentum.kdj_k),
        ("min_bias", p.bias),
        ("min_volume_ratio", p.volume.ratio),
    ] {
        if let Some(band) = band {
            check_band("signal", key, &band)?;
        }
    }

    Ok(p)
}

pub fn build_exit_policy(adapter: &dyn ConfigPort) -> Result<ExitPolicy, RevscanError> {
    let defaults = ExitPolicy::default();
    let num = |key: &str| read_f64(adapter, "exit", key);

    let trailing_floor = match adapter.get_string("exit", "trailing_floor") {
        Some(v) if v.trim().is_empty() => None,
        Some(_) => num("trailing_floor")?,
        None => defaults.trailing_floor,
    };

    let life_line = match read_usize(adapter, "exit", "life_line_day")? {
        Some(day) => Some(LifeLine {
            day,
            threshold: num("life_line_threshold")?.unwrap_or(1.0),
        }),
        None => None,
    };

    Ok(ExitPolicy {
        stop_loss: num("stop_loss")?.unwrap_or(defaults.stop_loss),
        trailing_trigger: num("trailing_trigger")?.unwrap_or(defaults.trailing_trigger),
        trailing_drawback: num("trailing_drawback")?.unwrap_or(defaults.trailing_drawback),
        trailing_floor,
        life_line,
    })
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    workers_override: Option<usize>,
) -> Result<BacktestConfig, RevscanError> {
    let mut horizons = read_usize_list(adapter, "backtest", "horizons")?
        .unwrap_or_else(|| DEFAULT_HORIZONS.to_vec());
    horizons.sort_unstable();
    horizons.dedup();

    let gap_min = read_f64(adapter, "backtest", "entry_gap_min")?;
    let gap_max = read_f64(adapter, "backtest", "entry_gap_max")?;
    let entry_gap = override_band(None, gap_min, gap_max).map(|b| Band { strict: true, ..b });

    let workers = match workers_override {
        Some(w) => w,
        None => read_usize(adapter, "backtest", "workers")?.unwrap_or_else(default_workers),
    };

    Ok(BacktestConfig {
        windows: build_windows(adapter)?,
        horizons,
        min_history: read_usize(adapter, "backtest", "min_history")?
            .unwrap_or(backtest_engine::DEFAULT_MIN_HISTORY),
        lookback: read_usize(adapter, "backtest", "lookback")?,
        entry_gap,
        workers,
    })
}

pub fn resolve_data_dir(
    data_dir_override: Option<&PathBuf>,
    adapter: &dyn ConfigPort,
) -> Result<PathBuf, RevscanError> {
    if let Some(dir) = data_dir_override {
        return Ok(dir.clone());
    }
    adapter
        .get_string("backtest", "data_dir")
        .filter(|d| !d.trim().is_empty())
        .map(|d| PathBuf::from(d.trim()))
        .ok_or_else(|| RevscanError::ConfigMissing {
            section: "backtest".to_string(),
            key: "data_dir".to_string(),
        })
}

/// Explicit code list from `[backtest] codes`, if configured.
pub fn resolve_codes(adapter: &dyn ConfigPort) -> Result<Option<Vec<String>>, RevscanError> {
    match adapter.get_string("backtest", "codes") {
        Some(codes) if !codes.trim().is_empty() => parse_codes(&codes)
            .map(Some)
            .map_err(|e| RevscanError::config_invalid("backtest", "codes", e.to_string())),
        _ => Ok(None),
    }
}

fn output_path(
    output_override: Option<&PathBuf>,
    adapter: &dyn ConfigPort,
    key: &str,
) -> Option<String> {
    output_override
        .map(|p| p.display().to_string())
        .or_else(|| adapter.get_string("output", key))
        .filter(|p| !p.trim().is_empty())
}

pub fn resolve_universe(
    source: &dyn SeriesSource,
    settings: &RunSettings,
) -> Result<Universe, RevscanError> {
    universe::resolve(source, settings.codes.as_deref(), &settings.prefixes)?
        .exclude_flagged(&settings.names)
}

/// Run the backtest and persist the trade log and summaries.
pub fn run_backtest_pipeline(
    source: &dyn SeriesSource,
    report: &dyn ReportPort,
    settings: &RunSettings,
    trades_path: Option<&str>,
    summary_path: Option<&str>,
) -> Result<BacktestResult, RevscanError> {
    let universe = resolve_universe(source, settings)?;
    let result = backtest_engine::run_from_source(
        source,
        &universe,
        &settings.profile,
        &settings.policy,
        &settings.backtest,
    )?;

    if let Some(path) = trades_path {
        report.write_trades(&result.trades, path)?;
        info!("trade log written to {}", path);
    }
    if let Some(path) = summary_path {
        report.write_summaries(&result.summary_list(), path)?;
        info!("summary written to {}", path);
    }
    Ok(result)
}

pub fn print_backtest(result: &BacktestResult, settings: &RunSettings) {
    println!(
        "=== {} | {} securities | {} signals ({} gated) ===",
        settings.profile.name, result.series_processed, result.signal_count, result.gated_count
    );
    for summary in result.summaries.values() {
        println!("{summary}");
    }

    println!("\n=== Exit reasons ===");
    for summary in result.summaries.values() {
        let parts: Vec<String> = summary
            .exit_counts
            .iter()
            .map(|(reason, n)| format!("{reason} {n}"))
            .collect();
        println!("{:>3}d  {}", summary.horizon, parts.join("  "));
    }

    println!("\n=== Mean return by next-day open gap ===");
    for summary in result.summaries.values() {
        let parts: Vec<String> = [
            GapBucket::GapDown,
            GapBucket::Flat,
            GapBucket::GapUp,
            GapBucket::Surge,
        ]
        .iter()
        .filter_map(|b| {
            summary
                .gap_buckets
                .get(b)
                .map(|s| format!("{}: {:+.2}% ({})", b.label(), s.mean_return, s.count))
        })
        .collect();
        println!("{:>3}d  {}", summary.horizon, parts.join("  "));
    }

    if !result.failures.is_empty() {
        println!("\n{} securities failed:", result.failures.len());
        for failure in &result.failures {
            println!("  {failure}");
        }
    }
}

fn run_backtest(config_path: &Path, overrides: &Overrides) -> Result<(), RevscanError> {
    let adapter = load_config(config_path)?;
    let settings = build_settings(&adapter, overrides)?;
    let source = CsvAdapter::new(settings.data_dir.clone());

    let trades_path = output_path(overrides.output.as_ref(), &adapter, "trades_path")
        .unwrap_or_else(|| DEFAULT_TRADES_PATH.to_string());
    let summary_path = output_path(None, &adapter, "summary_path");

    let result = run_backtest_pipeline(
        &source,
        &CsvReportAdapter::with_names(settings.names.clone()),
        &settings,
        Some(&trades_path),
        summary_path.as_deref(),
    )?;
    print_backtest(&result, &settings);
    Ok(())
}

pub fn run_dry_run(config_path: &Path, overrides: &Overrides) -> Result<(), RevscanError> {
    let adapter = load_config(config_path)?;
    let settings = build_settings(&adapter, overrides)?;
    eprintln!("Config validated successfully");

    let p = &settings.profile;
    eprintln!("\nFilter profile: {}", p.name);
    if let Some(band) = p.price {
        eprintln!("  price:      {band}");
    }
    if let Some(band) = p.momentum.rsi {
        eprintln!("  rsi:        {band}");
    }
    if let Some(band) = p.momentum.kdj_k {
        eprintln!("  kdj k:      {band}");
    }
    if let Some(band) = p.bias {
        eprintln!("  bias20:     {band}");
    }
    if let Some(band) = p.volume.ratio {
        eprintln!("  vol ratio:  {band}");
    }

    let e = &settings.policy;
    eprintln!("\nExit policy:");
    eprintln!("  stop loss:  {}%", e.stop_loss);
    eprintln!(
        "  trailing:   trigger {}%, drawback {}, floor {}",
        e.trailing_trigger,
        e.trailing_drawback,
        e.trailing_floor
            .map_or("none".to_string(), |f| format!("{f}%"))
    );
    if let Some(life_line) = e.life_line {
        eprintln!(
            "  life line:  day {} below {}%",
            life_line.day, life_line.threshold
        );
    }

    let b = &settings.backtest;
    eprintln!("\nBacktest:");
    eprintln!("  horizons:   {:?}", b.horizons);
    eprintln!("  history:    {} bars minimum", b.required_history());
    eprintln!("  workers:    {}", b.workers);

    let source = CsvAdapter::new(settings.data_dir.clone());
    let universe = resolve_universe(&source, &settings)?;
    eprintln!("\nUniverse: {} securities in {}", universe.count(), settings.data_dir.display());

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

pub fn run_scan_pipeline(
    source: &dyn SeriesSource,
    settings: &RunSettings,
) -> Result<ScanResult, RevscanError> {
    let universe = resolve_universe(source, settings)?;
    let pool = WorkerPool::new(settings.backtest.workers)?;
    scan::run_scan(
        source,
        &universe,
        &settings.profile,
        &settings.backtest.windows,
        &pool,
    )
}

fn run_scan(config_path: &Path, overrides: &Overrides) -> Result<(), RevscanError> {
    let adapter = load_config(config_path)?;
    let settings = build_settings(&adapter, overrides)?;
    let source = CsvAdapter::new(settings.data_dir.clone());

    let result = run_scan_pipeline(&source, &settings)?;

    println!(
        "{:<10} {:<10} {:<10} {:>8} {:>7} {:>7} {:>8} {:>7}",
        "code", "name", "date", "close", "rsi", "k", "bias20", "potent"
    );
    let fmt = |v: Option<f64>| v.map_or("-".to_string(), |x| format!("{x:.2}"));
    for hit in &result.hits {
        let s = &hit.snapshot;
        println!(
            "{:<10} {:<10} {:<10} {:>8.2} {:>7} {:>7} {:>8} {:>7}",
            hit.code,
            settings.names.get(&hit.code).unwrap_or("-"),
            hit.date,
            s.close,
            fmt(s.rsi),
            fmt(s.k),
            fmt(s.bias20),
            fmt(s.profit_potential)
        );
    }
    println!(
        "\n{} of {} securities signal on their latest bar",
        result.hits.len(),
        result.scanned
    );

    if let Some(path) = output_path(overrides.output.as_ref(), &adapter, "scan_path") {
        CsvReportAdapter::with_names(settings.names.clone()).write_scan(&result.hits, &path)?;
        info!("scan results written to {}", path);
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), RevscanError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;
    build_filter_profile(&adapter, None)?;
    build_exit_policy(&adapter)?;
    build_backtest_config(&adapter, None)?;
    resolve_data_dir(None, &adapter)?;
    eprintln!("Configuration is valid");
    Ok(())
}

fn run_profiles() {
    for name in BUILTIN_PROFILES {
        println!("{name}");
    }
}
