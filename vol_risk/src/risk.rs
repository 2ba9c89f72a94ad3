/// risk.rs — Quantile risk classifier
///
///   q_mid  = Q(vol, 0.5)      q_high = Q(vol, 0.9)
///   High   if vol ≥ q_high
///   Medium if vol ≥ q_mid
///   Low    otherwise
///
/// Cut points are computed once over every defined value present when the
/// classifier runs.  A row's label can therefore depend on later rows: this
/// is retrospective risk reporting, not a leak-free forecasting signal.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::quantile;
use crate::table::RiskTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Which volatility series a classifier or snapshot reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VolatilityColumn {
    /// Trailing realized volatility (`Volatility`)
    Realized,
    /// GARCH conditional volatility (`GARCH_Volatility`), the primary series
    #[default]
    Conditional,
}

impl VolatilityColumn {
    pub fn name(&self) -> &'static str {
        match self {
            VolatilityColumn::Realized => "Volatility",
            VolatilityColumn::Conditional => "GARCH_Volatility",
        }
    }
}

impl std::str::FromStr for VolatilityColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "realized" | "volatility" => Ok(VolatilityColumn::Realized),
            "conditional" | "garch" | "garch_volatility" => Ok(VolatilityColumn::Conditional),
            other => Err(format!("unknown volatility column `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub mid_quantile:  f64,
    pub high_quantile: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self { mid_quantile: 0.5, high_quantile: 0.9 }
    }
}

/// Resolved cut points for one classification run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutPoints {
    pub mid:  f64,
    pub high: f64,
}

impl CutPoints {
    pub fn from_values(values: &[f64], t: RiskThresholds) -> Option<Self> {
        Some(Self {
            mid:  quantile(values, t.mid_quantile)?,
            high: quantile(values, t.high_quantile)?,
        })
    }

    pub fn classify(&self, vol: f64) -> RiskLevel {
        if vol >= self.high {
            RiskLevel::High
        } else if vol >= self.mid {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Fill `Risk_Level` from the chosen volatility column.  Rows where that
/// column is undefined stay unlabelled.
pub fn assign_risk_levels(
    mut table: RiskTable,
    column: VolatilityColumn,
    thresholds: RiskThresholds,
) -> RiskTable {
    let values = table.vol_values(column);
    let Some(cuts) = CutPoints::from_values(&values, thresholds) else {
        return table;
    };
    debug!(
        "Risk cut points on {}: mid={:.6} high={:.6} over {} values",
        column.name(),
        cuts.mid,
        cuts.high,
        values.len()
    );

    for row in table.rows_mut() {
        row.risk_level = row.vol(column).map(|v| cuts.classify(v));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RiskRow;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn table_with_realized(vols: &[Option<f64>]) -> RiskTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        RiskTable::from_rows(
            vols.iter()
                .enumerate()
                .map(|(i, v)| {
                    let mut r = RiskRow::new(start + Duration::days(i as i64), 100.0);
                    r.volatility = *v;
                    r.garch_volatility = v.map(|x| x * 100.0);
                    r
                })
                .collect(),
        )
    }

    #[test]
    fn buckets_by_whole_sample_quantiles() {
        let vols: Vec<Option<f64>> = (1..=10).map(|i| Some(i as f64)).collect();
        let t = assign_risk_levels(table_with_realized(&vols), VolatilityColumn::Realized, RiskThresholds::default());
        let levels: Vec<RiskLevel> = t.rows().iter().map(|r| r.risk_level.unwrap()).collect();
        // Q(0.5) = 5.5, Q(0.9) = 9.1
        assert_eq!(&levels[..5], &[RiskLevel::Low; 5]);
        assert_eq!(&levels[5..9], &[RiskLevel::Medium; 4]);
        assert_eq!(levels[9], RiskLevel::High);
    }

    #[test]
    fn undefined_rows_are_skipped() {
        let t = assign_risk_levels(
            table_with_realized(&[None, Some(1.0), Some(2.0)]),
            VolatilityColumn::Realized,
            RiskThresholds::default(),
        );
        assert_eq!(t.rows()[0].risk_level, None);
        assert!(t.rows()[1].risk_level.is_some());
    }

    #[test]
    fn conditional_and_realized_agree_when_proportional() {
        let vols: Vec<Option<f64>> = [3.0, 1.0, 4.0, 1.5, 5.0, 9.0, 2.6].iter().map(|v| Some(*v)).collect();
        let a = assign_risk_levels(table_with_realized(&vols), VolatilityColumn::Realized, RiskThresholds::default());
        let b = assign_risk_levels(table_with_realized(&vols), VolatilityColumn::Conditional, RiskThresholds::default());
        let la: Vec<_> = a.rows().iter().map(|r| r.risk_level).collect();
        let lb: Vec<_> = b.rows().iter().map(|r| r.risk_level).collect();
        assert_eq!(la, lb);
    }

    #[test]
    fn column_names_parse() {
        assert_eq!("garch".parse::<VolatilityColumn>(), Ok(VolatilityColumn::Conditional));
        assert_eq!("Realized".parse::<VolatilityColumn>(), Ok(VolatilityColumn::Realized));
        assert!("implied".parse::<VolatilityColumn>().is_err());
        assert_eq!(VolatilityColumn::default(), VolatilityColumn::Conditional);
    }

    proptest! {
        #[test]
        fn labels_respect_cut_points(v in prop::collection::vec(0.0f64..1.0, 2..300)) {
            let vols: Vec<Option<f64>> = v.iter().map(|x| Some(*x)).collect();
            let t = assign_risk_levels(table_with_realized(&vols), VolatilityColumn::Realized, RiskThresholds::default());
            let cuts = CutPoints::from_values(&v, RiskThresholds::default()).unwrap();
            prop_assert!(cuts.high >= cuts.mid);
            for row in t.rows() {
                let vol = row.volatility.unwrap();
                match row.risk_level.unwrap() {
                    RiskLevel::High => prop_assert!(vol >= cuts.high),
                    RiskLevel::Medium => prop_assert!(vol >= cuts.mid && vol < cuts.high),
                    RiskLevel::Low => prop_assert!(vol < cuts.mid),
                }
            }
        }
    }
}
