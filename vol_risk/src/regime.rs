/// regime.rs — Rule-based market regime
///
///   Crisis if σ_realized ≥ Q(σ_realized, 0.9), Calm otherwise.
///
/// Same whole-sample, non-causal caveat as the risk classifier.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::quantile;
use crate::table::RiskTable;

pub const DEFAULT_CRISIS_QUANTILE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    Calm,
    Crisis,
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketRegime::Calm => write!(f, "Calm"),
            MarketRegime::Crisis => write!(f, "Crisis"),
        }
    }
}

/// Fill `Market_Regime` from realized volatility.
pub fn detect_market_regime(mut table: RiskTable, crisis_quantile: f64) -> RiskTable {
    let values: Vec<f64> = table.rows().iter().filter_map(|r| r.volatility).collect();
    let Some(threshold) = quantile(&values, crisis_quantile) else {
        return table;
    };

    let mut crisis = 0usize;
    for row in table.rows_mut() {
        row.market_regime = row.volatility.map(|v| {
            if v >= threshold {
                crisis += 1;
                MarketRegime::Crisis
            } else {
                MarketRegime::Calm
            }
        });
    }
    debug!("Market regime: threshold={:.6} crisis_rows={}", threshold, crisis);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RiskRow;
    use chrono::{Duration, NaiveDate};

    fn table(vols: &[f64]) -> RiskTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        RiskTable::from_rows(
            vols.iter()
                .enumerate()
                .map(|(i, v)| {
                    let mut r = RiskRow::new(start + Duration::days(i as i64), 100.0);
                    r.volatility = Some(*v);
                    r
                })
                .collect(),
        )
    }

    #[test]
    fn top_decile_is_crisis() {
        let vols: Vec<f64> = (1..=20).map(f64::from).collect();
        let t = detect_market_regime(table(&vols), DEFAULT_CRISIS_QUANTILE);
        // Q(0.9) = 18.1
        let crisis: Vec<usize> = t
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.market_regime == Some(MarketRegime::Crisis))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(crisis, vec![18, 19]);
    }

    #[test]
    fn identical_inputs_give_identical_labels() {
        let vols = [0.01, 0.03, 0.02, 0.05, 0.04, 0.011];
        let a = detect_market_regime(table(&vols), DEFAULT_CRISIS_QUANTILE);
        let b = detect_market_regime(table(&vols), DEFAULT_CRISIS_QUANTILE);
        assert_eq!(a, b);
    }

    #[test]
    fn constant_series_is_all_crisis() {
        // every value equals its own 0.9 quantile
        let t = detect_market_regime(table(&[0.02; 5]), DEFAULT_CRISIS_QUANTILE);
        assert!(t.rows().iter().all(|r| r.market_regime == Some(MarketRegime::Crisis)));
    }
}
