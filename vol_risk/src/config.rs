/// config.rs — Centralised configuration loaded from .env
///
/// All parameters consumed by the risk pipeline are defined here.
/// Loading happens once at startup; the pipeline borrows `&PipelineConfig`.
use anyhow::Result;
use chrono::NaiveDate;
use std::env;

use crate::alerts::DEFAULT_SPIKE_THRESHOLD;
use crate::error::InputError;
use crate::features::DEFAULT_VOL_WINDOW;
use crate::models::garch;
use crate::models::hmm::HmmConfig;
use crate::regime::DEFAULT_CRISIS_QUANTILE;
use crate::risk::{RiskThresholds, VolatilityColumn};

pub const DEFAULT_ASSET: &str = "EEM";
pub const DEFAULT_START_DATE: &str = "2010-01-01";
pub const DEFAULT_HISTORY_LIMIT: usize = 250;
pub const DEFAULT_ALERTS_LIMIT: usize = 50;

/// Pure pipeline parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Realized volatility window (observations)
    pub vol_window: usize,
    /// GARCH return scaling constant
    pub garch_scale: f64,
    /// Risk level quantile cut points
    pub risk: RiskThresholds,
    /// Column the primary risk classification reads
    pub risk_column: VolatilityColumn,
    /// Realized-vol quantile above which the market is in Crisis
    pub crisis_quantile: f64,
    /// Whether to fit the HMM and emit `HMM_Regime`
    pub hmm_enabled: bool,
    pub hmm: HmmConfig,
    /// Relative volatility jump that raises a spike alert
    pub spike_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vol_window:      DEFAULT_VOL_WINDOW,
            garch_scale:     garch::DEFAULT_SCALE,
            risk:            RiskThresholds::default(),
            risk_column:     VolatilityColumn::Conditional,
            crisis_quantile: DEFAULT_CRISIS_QUANTILE,
            hmm_enabled:     true,
            hmm:             HmmConfig::default(),
            spike_threshold: DEFAULT_SPIKE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Reject parameters under which a stage would leave its column empty.
    pub fn validate(&self) -> std::result::Result<(), InputError> {
        let invalid = |msg: String| Err(InputError::InvalidParameter(msg));

        if self.vol_window < 2 {
            return invalid(format!("vol_window must be at least 2, got {}", self.vol_window));
        }
        for (name, q) in [
            ("risk mid quantile", self.risk.mid_quantile),
            ("risk high quantile", self.risk.high_quantile),
            ("crisis quantile", self.crisis_quantile),
        ] {
            if !(0.0..=1.0).contains(&q) {
                return invalid(format!("{name} must lie in [0, 1], got {q}"));
            }
        }
        if self.risk.mid_quantile > self.risk.high_quantile {
            return invalid(format!(
                "risk mid quantile {} exceeds high quantile {}",
                self.risk.mid_quantile, self.risk.high_quantile
            ));
        }
        if !(self.garch_scale > 0.0) {
            return invalid(format!("garch_scale must be positive, got {}", self.garch_scale));
        }
        if self.hmm.n_iter == 0 {
            return invalid("hmm n_iter must be positive".into());
        }
        if !(self.hmm.min_covar >= 0.0) {
            return invalid(format!("hmm min_covar must be non-negative, got {}", self.hmm.min_covar));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── Asset / history ──────────────────────────────────────────────
    pub asset:      String,
    pub start_date: NaiveDate,

    // ── Pipeline ─────────────────────────────────────────────────────
    pub pipeline: PipelineConfig,

    // ── Reporting windows ────────────────────────────────────────────
    pub history_limit: usize,
    pub alerts_limit:  usize,

    // ── Run cache ────────────────────────────────────────────────────
    /// Seconds a cached run stays fresh; 0 disables expiry
    pub cache_ttl_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env

        let asset = env::var("RISK_ASSET").unwrap_or_else(|_| DEFAULT_ASSET.into());
        let start_raw = env::var("RISK_START_DATE").unwrap_or_else(|_| DEFAULT_START_DATE.into());
        let start_date = NaiveDate::parse_from_str(&start_raw, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Config key RISK_START_DATE: {e}"))?;

        let defaults = PipelineConfig::default();
        let risk_column = match env::var("RISK_VOL_COLUMN") {
            Ok(v) => v.parse::<VolatilityColumn>().map_err(|e| anyhow::anyhow!("Config key RISK_VOL_COLUMN: {e}"))?,
            Err(_) => defaults.risk_column,
        };

        let pipeline = PipelineConfig {
            vol_window:  parse_env("RISK_VOL_WINDOW", defaults.vol_window)?,
            garch_scale: parse_env("GARCH_SCALE",     defaults.garch_scale)?,
            risk: RiskThresholds {
                mid_quantile:  parse_env("RISK_MID_QUANTILE",  defaults.risk.mid_quantile)?,
                high_quantile: parse_env("RISK_HIGH_QUANTILE", defaults.risk.high_quantile)?,
            },
            risk_column,
            crisis_quantile: parse_env("REGIME_CRISIS_QUANTILE", defaults.crisis_quantile)?,
            hmm_enabled:     parse_env("HMM_ENABLED", defaults.hmm_enabled)?,
            hmm: HmmConfig {
                n_iter:    parse_env("HMM_N_ITER",    defaults.hmm.n_iter)?,
                tol:       parse_env("HMM_TOL",       defaults.hmm.tol)?,
                min_covar: parse_env("HMM_MIN_COVAR", defaults.hmm.min_covar)?,
                seed:      parse_env("HMM_SEED",      defaults.hmm.seed)?,
            },
            spike_threshold: parse_env("ALERT_SPIKE_THRESHOLD", defaults.spike_threshold)?,
        };
        pipeline.validate()?;

        Ok(Self {
            asset,
            start_date,
            pipeline,
            history_limit:  parse_env("HISTORY_LIMIT",  DEFAULT_HISTORY_LIMIT)?,
            alerts_limit:   parse_env("ALERTS_LIMIT",   DEFAULT_ALERTS_LIMIT)?,
            cache_ttl_secs: parse_env("CACHE_TTL_SECS", 3_600u64)?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_quantiles() {
        let cfg = PipelineConfig {
            risk: RiskThresholds { mid_quantile: 0.95, high_quantile: 0.9 },
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_quantile_outside_unit_interval() {
        let cfg = PipelineConfig { crisis_quantile: 1.5, ..PipelineConfig::default() };
        assert!(matches!(cfg.validate(), Err(InputError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_tiny_window() {
        let cfg = PipelineConfig { vol_window: 1, ..PipelineConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        assert_eq!(parse_env("VOL_RISK_TEST_UNSET_KEY", 17usize).unwrap(), 17);
    }
}
