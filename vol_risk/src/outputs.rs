/// outputs.rs — Flat records for reporting layers
///
/// Every record is one flat JSON object per row: ISO `YYYY-MM-DD` dates,
/// plain numbers and strings, `null` (or an omitted key) for undefined values,
/// never NaN.  serde_json writes f64 with shortest round-trip formatting, so
/// serialising and parsing back reproduces every value exactly.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::Alert;
use crate::error::InputError;
use crate::models::hmm::HmmRegime;
use crate::regime::MarketRegime;
use crate::risk::{RiskLevel, VolatilityColumn};
use crate::table::{RiskRow, RiskTable};

/// Display names for the assets the dashboard offers.
pub fn asset_display_name(ticker: &str) -> &str {
    match ticker {
        "EEM" => "Emerging Markets ETF (EEM)",
        "SPY" => "S&P 500 ETF (SPY)",
        "BTC-USD" => "Bitcoin (BTC-USD)",
        other => other,
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

// ── Latest snapshot ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub date:          NaiveDate,
    pub volatility:    f64,
    pub risk_level:    RiskLevel,
    pub market_regime: MarketRegime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmm_regime:    Option<HmmRegime>,
}

/// Snapshot of the latest row, reporting the selected volatility series.
///
/// `VolatilityColumn::default()` (conditional) is the series the primary run
/// classifies on.  `hmm_regime` is omitted when the table has no HMM column.
pub fn latest_risk_snapshot(
    table: &RiskTable,
    column: VolatilityColumn,
) -> Result<RiskSnapshot, InputError> {
    let latest = table.latest().ok_or(InputError::Empty)?;
    let missing = |column: &'static str| InputError::MissingValue { column, date: latest.date };

    Ok(RiskSnapshot {
        date:          latest.date,
        volatility:    finite(latest.vol(column)).ok_or_else(|| missing(column.name()))?,
        risk_level:    latest.risk_level.ok_or_else(|| missing("Risk_Level"))?,
        market_regime: latest.market_regime.ok_or_else(|| missing("Market_Regime"))?,
        hmm_regime:    if table.has_hmm_column() { latest.hmm_regime } else { None },
    })
}

// ── History ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date:             NaiveDate,
    pub volatility:       Option<f64>,
    pub garch_volatility: Option<f64>,
    pub risk_level:       Option<RiskLevel>,
    pub market_regime:    Option<MarketRegime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmm_regime:       Option<HmmRegime>,
}

impl From<&RiskRow> for HistoryRecord {
    fn from(r: &RiskRow) -> Self {
        Self {
            date:             r.date,
            volatility:       finite(r.volatility),
            garch_volatility: finite(r.garch_volatility),
            risk_level:       r.risk_level,
            market_regime:    r.market_regime,
            hmm_regime:       r.hmm_regime,
        }
    }
}

/// The most recent `limit` rows, oldest first.
pub fn history_records(table: &RiskTable, limit: usize) -> Vec<HistoryRecord> {
    table.tail(limit).iter().map(HistoryRecord::from).collect()
}

/// The most recent `limit` alerts, oldest first.
pub fn alert_records(alerts: &[Alert], limit: usize) -> Vec<Alert> {
    let start = alerts.len().saturating_sub(limit);
    alerts[start..]
        .iter()
        .map(|a| Alert { volatility: finite(a.volatility), ..a.clone() })
        .collect()
}

// ── Date-filtered view ────────────────────────────────────────────────────

/// Non-fatal: the requested window holds no observations.  Callers decide
/// whether to warn and stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no data available between {from} and {to}")]
pub struct EmptyResultWarning {
    pub from: NaiveDate,
    pub to:   NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView {
    pub table:  RiskTable,
    pub alerts: Vec<Alert>,
}

/// Restrict both tables to `[from, to]`, inclusive.
pub fn filter_by_date(
    table: &RiskTable,
    alerts: &[Alert],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<FilteredView, EmptyResultWarning> {
    let view = table.between(from, to);
    if view.is_empty() {
        return Err(EmptyResultWarning { from, to });
    }
    let alerts = alerts
        .iter()
        .filter(|a| a.date >= from && a.date <= to)
        .cloned()
        .collect();
    Ok(FilteredView { table: view, alerts })
}
