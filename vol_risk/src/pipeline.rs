/// pipeline.rs — Batch risk pipeline
///
/// ARCHITECTURE
/// ┌─────────────────────────────────────────────────────┐
/// │  PriceTable (validated daily bars)                  │
/// │        │                                            │
/// │        ▼                                            │
/// │  compute_returns → compute_volatility(window)       │
/// │        │                                            │
/// │   ┌────┴─────────────── rayon::join ───────┐        │
/// │   │  GARCH(1,1) fit        Gaussian HMM fit │        │
/// │   │  (returns ×100)        (cleaned returns)│        │
/// │   └────┬────────────────────────────┬──────┘        │
/// │        ▼                            │               │
/// │  join GARCH_Volatility by date      │               │
/// │  drop incomplete rows               │               │
/// │  assign_risk_levels(conditional)    │               │
/// │  detect_market_regime(realized)     │               │
/// │  join HMM_Regime by date ◄──────────┘               │
/// │        │                                            │
/// │        ▼                                            │
/// │  generate_risk_alerts → (RiskTable, Vec<Alert>)     │
/// └─────────────────────────────────────────────────────┘
///
/// Both fits read only the return series, so they run side by side.  GARCH
/// takes every return; the HMM takes the rows that survive cleaning.  A fit
/// failure aborts the run; no stage substitutes a default.
use ahash::AHashMap;
use chrono::NaiveDate;
use tracing::info;

use crate::alerts::{generate_risk_alerts, Alert};
use crate::config::PipelineConfig;
use crate::data::PriceTable;
use crate::error::{InputError, Result};
use crate::features::{compute_returns, compute_volatility};
use crate::models::garch::{self, GarchFit};
use crate::models::hmm::{self, HmmRegime};
use crate::regime::detect_market_regime;
use crate::risk::assign_risk_levels;
use crate::table::RiskTable;

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table:  RiskTable,
    pub alerts: Vec<Alert>,
    pub garch:  GarchFit,
}

/// Smallest price history the pipeline accepts for a given window.
pub fn min_history(cfg: &PipelineConfig) -> usize {
    cfg.vol_window + 1 + garch::MIN_OBSERVATIONS.max(hmm::MIN_OBSERVATIONS)
}

pub fn run_pipeline(prices: &PriceTable, cfg: &PipelineConfig) -> Result<PipelineOutput> {
    cfg.validate()?;
    let required = min_history(cfg);
    if prices.len() < required {
        return Err(InputError::InsufficientHistory { required, actual: prices.len() }.into());
    }
    info!(
        "Running risk pipeline over {} bars ({} → {})",
        prices.len(),
        prices.first_date(),
        prices.last_date()
    );

    // ── Features ──────────────────────────────────────────────────────────
    let table = compute_returns(RiskTable::from_prices(prices));
    let table = compute_volatility(table, cfg.vol_window);

    let returns = table.returns();
    let dates: Vec<NaiveDate> = returns.iter().map(|(d, _)| *d).collect();
    let values: Vec<f64> = returns.iter().map(|(_, r)| *r).collect();

    // ── Statistical fits ──────────────────────────────────────────────────
    // GARCH sees every return; the HMM sees only returns that survive the
    // clean step, i.e. those with a full volatility window behind them.
    let cleaned = cfg.vol_window - 1;
    let (hmm_dates, hmm_values) = (&dates[cleaned..], &values[cleaned..]);
    let (garch_fit, hmm_labels) = rayon::join(
        || garch::fit(&values, cfg.garch_scale),
        || cfg.hmm_enabled.then(|| hmm::detect_hmm_regime(hmm_values, &cfg.hmm)),
    );
    let garch_fit = garch_fit?;
    let hmm_labels = hmm_labels.transpose()?;

    let garch_by_date: AHashMap<NaiveDate, f64> = dates
        .iter()
        .copied()
        .zip(garch_fit.conditional_volatility.iter().copied())
        .collect();

    let mut table = table;
    for row in table.rows_mut() {
        row.garch_volatility = garch_by_date.get(&row.date).copied();
    }

    // ── Clean ─────────────────────────────────────────────────────────────
    let table = table.drop_incomplete();
    if table.is_empty() {
        return Err(InputError::InsufficientHistory { required, actual: prices.len() }.into());
    }

    // ── Classification ────────────────────────────────────────────────────
    let table = assign_risk_levels(table, cfg.risk_column, cfg.risk);
    let mut table = detect_market_regime(table, cfg.crisis_quantile);

    if let Some(labels) = hmm_labels {
        let hmm_by_date: AHashMap<NaiveDate, HmmRegime> =
            hmm_dates.iter().copied().zip(labels).collect();
        for row in table.rows_mut() {
            row.hmm_regime = hmm_by_date.get(&row.date).copied();
        }
        table.mark_hmm_column();
    }

    // ── Alerts ────────────────────────────────────────────────────────────
    let alerts = generate_risk_alerts(&table, cfg.spike_threshold);

    info!(
        "Pipeline complete: {} annotated rows, {} alerts",
        table.len(),
        alerts.len()
    );
    Ok(PipelineOutput { table, alerts, garch: garch_fit })
}
