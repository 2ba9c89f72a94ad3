/// main.rs — Risk report entry point
///
/// Runs the volatility risk pipeline over a local price export and prints one
/// report as JSON on stdout:
///   1. Load config from .env
///   2. Read the CSV and keep bars from the start date on
///   3. Run (or reuse) the pipeline for (asset, start)
///   4. Optionally restrict to a date window, then print
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vol_risk::cache;
use vol_risk::config::AppConfig;
use vol_risk::data::load_csv;
use vol_risk::outputs::{
    alert_records, asset_display_name, filter_by_date, history_records, latest_risk_snapshot,
};
use vol_risk::pipeline::run_pipeline;
use vol_risk::risk::VolatilityColumn;

#[derive(Parser)]
#[command(name = "vol_risk")]
#[command(about = "Volatility risk pipeline: GARCH, quantile risk levels, regimes and alerts")]
#[command(version)]
struct Cli {
    /// Daily price CSV with Date and Close columns
    #[arg(short, long)]
    file: PathBuf,

    /// Asset label (defaults to RISK_ASSET)
    #[arg(short, long)]
    asset: Option<String>,

    /// First bar to load, YYYY-MM-DD (defaults to RISK_START_DATE)
    #[arg(short, long)]
    start: Option<NaiveDate>,

    /// Report window start, inclusive
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Report window end, inclusive
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Recompute even if a cached run is still fresh
    #[arg(long)]
    refresh: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest risk snapshot
    Snapshot {
        /// realized | conditional
        #[arg(long, default_value = "conditional")]
        vol_column: VolatilityColumn,
    },
    /// Most recent annotated rows
    History {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Most recent alerts
    Alerts {
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────
    // stdout carries the report, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ── Config ───────────────────────────────────────────────────────────
    let cfg = AppConfig::from_env()?;
    let asset = cli.asset.clone().unwrap_or_else(|| cfg.asset.clone());
    let start = cli.start.unwrap_or(cfg.start_date);
    info!("Asset: {}  start={}", asset_display_name(&asset), start);
    info!(
        "Pipeline: window={} scale={} risk_q=({:.2}, {:.2}) crisis_q={:.2} hmm={}",
        cfg.pipeline.vol_window,
        cfg.pipeline.garch_scale,
        cfg.pipeline.risk.mid_quantile,
        cfg.pipeline.risk.high_quantile,
        cfg.pipeline.crisis_quantile,
        cfg.pipeline.hmm_enabled
    );

    // ── Run ──────────────────────────────────────────────────────────────
    let cache = cache::init_global(cache::ttl_from_secs(cfg.cache_ttl_secs));
    let compute = || {
        let prices = load_csv(&cli.file)?.since(start)?;
        run_pipeline(&prices, &cfg.pipeline)
    };
    let output = if cli.refresh {
        cache.refresh(&asset, start, compute)?
    } else {
        cache.get_or_run(&asset, start, compute)?
    };
    info!(
        "GARCH: ω={:.4} α={:.4} β={:.4} persistence={:.4} logL={:.2}",
        output.garch.model.omega,
        output.garch.model.alpha,
        output.garch.model.beta,
        output.garch.model.persistence(),
        output.garch.log_likelihood
    );

    // ── Date window ──────────────────────────────────────────────────────
    let view = match filter_by_date(
        &output.table,
        &output.alerts,
        cli.from.unwrap_or(NaiveDate::MIN),
        cli.to.unwrap_or(NaiveDate::MAX),
    ) {
        Ok(view) => view,
        Err(empty) => {
            warn!("{empty}");
            return Ok(());
        }
    };

    // ── Report ───────────────────────────────────────────────────────────
    let json = match cli.command {
        Commands::Snapshot { vol_column } => {
            serde_json::to_string_pretty(&latest_risk_snapshot(&view.table, vol_column)?)?
        }
        Commands::History { limit } => serde_json::to_string_pretty(&history_records(
            &view.table,
            limit.unwrap_or(cfg.history_limit),
        ))?,
        Commands::Alerts { limit } => serde_json::to_string_pretty(&alert_records(
            &view.alerts,
            limit.unwrap_or(cfg.alerts_limit),
        ))?,
    };
    println!("{json}");

    Ok(())
}
