//! SectorCycle CLI: analyze, cache and instrument-lookup commands.
//!
//! Commands:
//! - `analyze`: fetch (or load cached) GDP and sector index history, classify
//!   phases, print the per-phase summary and recommendation, save artifacts
//! - `cache status`: list cached series with row counts and date ranges
//! - `cache clear`: delete every cached series
//! - `resolve`: print the instrument token each configured sector maps to

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sectorcycle_core::analysis::PerformanceSummary;
use sectorcycle_core::data::{
    AccessToken, CredentialSource, FredProvider, KiteConnector, SectorConnector, SeriesCache,
    StaticToken, StdoutProgress, SyntheticProvider, TokenService,
};
use sectorcycle_core::domain::Phase;
use sectorcycle_runner::{
    save_report, AnalysisConfig, AnalysisReport, Collaborators, Pipeline, PipelineError,
};

#[derive(Parser)]
#[command(
    name = "sectorcycle",
    about = "SectorCycle: sector index performance across GDP expansion and recession"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and save report artifacts.
    Analyze {
        /// Path to a TOML config file. Defaults to the five NSE sector indices.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use seeded synthetic data instead of the brokerage and FRED.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Cache directory (overrides the config).
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output directory for report artifacts (overrides the config).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Resolve configured sector symbols to instrument tokens.
    Resolve {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Resolve against the synthetic catalog.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached series.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Delete every cached series.
    Clear {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            config,
            synthetic,
            seed,
            cache_dir,
            output_dir,
        } => run_analyze(config, synthetic, seed, cache_dir, output_dir),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clear { cache_dir, confirm } => run_cache_clear(&cache_dir, confirm),
        },
        Commands::Resolve { config, synthetic } => run_resolve(config, synthetic),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AnalysisConfig::default_nse()),
    }
}

/// Live collaborators: token from the environment or the login service,
/// Kite for sectors, FRED for GDP.
struct LiveSources {
    credentials: Box<dyn CredentialSource>,
    sectors: KiteConnector,
    macro_data: FredProvider,
}

impl LiveSources {
    fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let broker = &config.broker;
        let api_key = match std::env::var(&broker.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!(
                "brokerage API key not set: export {} (or run with --synthetic)",
                broker.api_key_env
            ),
        };

        let from_env = StaticToken::from_env(&broker.access_token_env);
        let credentials: Box<dyn CredentialSource> = if from_env.current_access_token().is_ok() {
            info!(var = %broker.access_token_env, "using access token from environment");
            Box::new(from_env)
        } else {
            Box::new(TokenService::new(broker.token_service_url.clone())?)
        };

        Ok(Self {
            credentials,
            sectors: KiteConnector::new(api_key),
            macro_data: FredProvider::new()?,
        })
    }
}

fn synthetic_provider(config: &AnalysisConfig, seed: u64) -> SyntheticProvider {
    let symbols = config.sectors.iter().map(|s| s.symbol.clone()).collect();
    SyntheticProvider::new(seed, symbols)
}

fn run_analyze(
    config_path: Option<PathBuf>,
    synthetic: bool,
    seed: u64,
    cache_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    match cache_dir {
        Some(dir) => config.cache_dir = dir,
        // Keep synthetic series away from real ones.
        None if synthetic => config.cache_dir = config.cache_dir.join("synthetic"),
        None => {}
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    let output_dir = config.output_dir.clone();
    let progress = StdoutProgress;

    let result = if synthetic {
        let provider = synthetic_provider(&config, seed);
        let credentials = StaticToken::new(Some(AccessToken::new("synthetic")));
        let collaborators = Collaborators {
            credentials: &credentials,
            sectors: &provider,
            macro_data: &provider,
            progress: &progress,
        };
        Pipeline::new(config, collaborators).run()
    } else {
        let live = LiveSources::from_config(&config)?;
        let collaborators = Collaborators {
            credentials: live.credentials.as_ref(),
            sectors: &live.sectors,
            macro_data: &live.macro_data,
            progress: &progress,
        };
        Pipeline::new(config, collaborators).run()
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            if matches!(e, PipelineError::MissingCredential(_)) {
                eprintln!("Log in through the token service, or set the access token environment variable.");
            }
            std::process::exit(1);
        }
    };

    print_summary(&report, synthetic);

    save_report(&report, &output_dir)?;
    println!("Artifacts saved to: {}", output_dir.display());
    Ok(())
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn print_table(summary: &PerformanceSummary, report: &AnalysisReport) {
    println!(
        "{:<10} {:>12} {:>12} {:>12} {:>6}",
        "Sector", "Expansion", "Recession", "Momentum", "Pick"
    );
    println!("{}", "-".repeat(56));

    for perf in summary.iter() {
        let momentum = report.momentum.get(&perf.sector).copied();
        let pick = report
            .recommendation
            .as_ref()
            .map_or("?", |r| if r.sectors.contains(&perf.sector) { "yes" } else { "" });
        println!(
            "{:<10} {:>12} {:>12} {:>12} {:>6}",
            perf.sector,
            fmt_pct(perf.mean(Phase::Expansion)),
            fmt_pct(perf.mean(Phase::Recession)),
            fmt_pct(momentum),
            pick
        );
    }
}

fn print_summary(report: &AnalysisReport, synthetic: bool) {
    println!();
    println!("=== Sector Performance by Economic Phase ===");
    println!("Period:         {}", report.span);
    println!("Macro series:   {}", report.macro_series_id);
    println!("Quarters:       {}", report.phases.len());
    let recessions = report
        .phases
        .iter()
        .filter(|p| p.phase == Phase::Recession)
        .count();
    println!("Recession qtrs: {recessions}");
    println!("Momentum:       {} observations", report.momentum_window);
    println!();

    print_table(&report.summary, report);
    println!();

    match &report.recommendation {
        Some(rec) => {
            println!("Current phase:  {}", rec.current_phase);
            if rec.sectors.is_empty() {
                println!("Recommended:    none (no sector meets expansion and momentum criteria)");
            } else {
                println!("Recommended:    {}", rec.sectors.join(", "));
            }
        }
        None => {
            println!("Current phase:  {}", report.current_phase);
            println!("Recommended:    no recommendation produced");
        }
    }

    if !report.correlation.is_empty() {
        println!();
        println!(
            "--- Daily return correlation ({} days) ---",
            report.correlation.observations
        );
        print!("{:<10}", "");
        for name in &report.correlation.sectors {
            print!(" {name:>8}");
        }
        println!();
        for (name, row) in report.correlation.sectors.iter().zip(&report.correlation.values) {
            print!("{name:<10}");
            for value in row {
                match value {
                    Some(v) => print!(" {v:>8.2}"),
                    None => print!(" {:>8}", "-"),
                }
            }
            println!();
        }
    }

    if synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    for note in &report.notes {
        println!("WARNING [{}]: {}", note.stage, note.message);
    }
    println!("Fingerprint:    {}", &report.fingerprint[..12.min(report.fingerprint.len())]);
    println!();
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = SeriesCache::new(cache_dir);
    let statuses = cache.status()?;
    if statuses.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total_size: u64 = statuses.iter().map(|s| s.size_bytes).sum();
    println!("Cache: {}", cache_dir.display());
    println!("Series: {}", statuses.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<28} {:<26} {:>8} {:>10}", "Key", "Date Range", "Rows", "Size");
    println!("{}", "-".repeat(75));
    for status in &statuses {
        let (range, rows) = match &status.meta {
            Some(meta) => (
                format!("{} to {}", meta.start_date, meta.end_date),
                meta.row_count.to_string(),
            ),
            None => ("(no meta)".to_string(), "-".to_string()),
        };
        println!(
            "{:<28} {:<26} {:>8} {:>10}",
            status.key,
            range,
            rows,
            format_size(status.size_bytes)
        );
    }

    Ok(())
}

fn run_cache_clear(cache_dir: &Path, confirm: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = SeriesCache::new(cache_dir);
    let statuses = cache.status()?;
    if statuses.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!("Found {} cached series:", statuses.len());
    for status in &statuses {
        println!("  {} ({})", status.key, format_size(status.size_bytes));
    }

    if !confirm {
        println!();
        println!("Dry run: pass --confirm to actually delete.");
        return Ok(());
    }

    let removed = cache.clear()?;
    println!("Done. Removed {removed} series.");
    Ok(())
}

fn run_resolve(config_path: Option<PathBuf>, synthetic: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let exchange = &config.broker.exchange;

    let catalog = if synthetic {
        let provider = synthetic_provider(&config, 42);
        provider.connect(&AccessToken::new("synthetic"))?.instrument_catalog(exchange)?
    } else {
        let live = LiveSources::from_config(&config)?;
        let token = live.credentials.current_access_token()?;
        live.sectors.connect(&token)?.instrument_catalog(exchange)?
    };

    println!("{:<10} {:<16} {:>12}", "Sector", "Symbol", "Token");
    println!("{}", "-".repeat(40));
    let mut unresolved = 0;
    for sector in &config.sectors {
        let token = sector
            .instrument_token
            .or_else(|| catalog.resolve_index(&sector.symbol));
        match token {
            Some(token) => println!("{:<10} {:<16} {:>12}", sector.name, sector.symbol, token),
            None => {
                unresolved += 1;
                println!("{:<10} {:<16} {:>12}", sector.name, sector.symbol, "not found");
            }
        }
    }

    if unresolved > 0 {
        eprintln!("{unresolved} sector(s) could not be resolved on {exchange}");
        std::process::exit(1);
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
