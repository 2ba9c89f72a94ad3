/// alerts.rs — Change-point alert stream
///
/// Compares each row with the one before it, in date order:
///
///   Risk change:   prev Risk_Level defined and ≠ current
///   Regime change: prev Market_Regime defined and ≠ current
///   Vol spike:     prev σ > 0 and (σ_t − σ_{t−1}) / σ_{t−1} ≥ threshold
///
/// A row yields one alert when at least one trigger fires; messages are
/// joined in the order risk, regime, spike.  There is no hysteresis: a label
/// flipping on consecutive days alerts on every flip.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::regime::MarketRegime;
use crate::risk::RiskLevel;
use crate::table::{RiskRow, RiskTable};

/// Default relative volatility jump that counts as a spike (+50%).
pub const DEFAULT_SPIKE_THRESHOLD: f64 = 0.5;

pub const MESSAGE_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub date:          NaiveDate,
    pub risk_level:    Option<RiskLevel>,
    pub market_regime: Option<MarketRegime>,
    pub volatility:    Option<f64>,
    pub alert:         String,
}

fn triggers(prev: &RiskRow, curr: &RiskRow, spike_threshold: f64) -> Vec<String> {
    let mut messages = Vec::new();

    if let (Some(p), Some(c)) = (prev.risk_level, curr.risk_level) {
        if p != c {
            messages.push(format!("Risk changed: {p} → {c}"));
        }
    }

    if let (Some(p), Some(c)) = (prev.market_regime, curr.market_regime) {
        if p != c {
            messages.push(format!("Regime switched: {p} → {c}"));
        }
    }

    if let (Some(p), Some(c)) = (prev.volatility, curr.volatility) {
        if p > 0.0 {
            let pct_change = (c - p) / p;
            if pct_change >= spike_threshold {
                messages.push(format!("Volatility spike: {:.1}%", pct_change * 100.0));
            }
        }
    }

    messages
}

/// Sparse alert stream for an annotated table.  The first row never alerts.
pub fn generate_risk_alerts(table: &RiskTable, spike_threshold: f64) -> Vec<Alert> {
    let alerts: Vec<Alert> = table
        .rows()
        .windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            let messages = triggers(prev, curr, spike_threshold);
            (!messages.is_empty()).then(|| Alert {
                date:          curr.date,
                risk_level:    curr.risk_level,
                market_regime: curr.market_regime,
                volatility:    curr.volatility,
                alert:         messages.join(MESSAGE_SEPARATOR),
            })
        })
        .collect();

    info!("Generated {} alerts over {} rows", alerts.len(), table.len());
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{compute_returns, compute_volatility};
    use crate::regime::detect_market_regime;
    use crate::risk::{assign_risk_levels, RiskThresholds, VolatilityColumn};
    use chrono::Duration;

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(i)
    }

    fn row(i: i64, risk: RiskLevel, regime: MarketRegime, vol: Option<f64>) -> RiskRow {
        let mut r = RiskRow::new(day(i), 100.0);
        r.risk_level = Some(risk);
        r.market_regime = Some(regime);
        r.volatility = vol;
        r
    }

    #[test]
    fn five_day_scenario_through_every_stage() {
        // daily returns [NaN, 0.01, -0.02, 0.05, -0.01], 2-day volatility
        let mut close = 100.0;
        let rows = [0.0, 0.01, -0.02, 0.05, -0.01]
            .iter()
            .enumerate()
            .map(|(i, r)| {
                close *= 1.0 + r;
                RiskRow::new(day(i as i64), close)
            })
            .collect();
        let table = compute_volatility(compute_returns(RiskTable::from_rows(rows)), 2);

        let rets: Vec<Option<f64>> = table.rows().iter().map(|r| r.ret).collect();
        assert!(rets[0].is_none());
        for (got, want) in rets[1..].iter().zip([0.01, -0.02, 0.05, -0.01]) {
            assert!((got.unwrap() - want).abs() < 1e-12);
        }
        let vols: Vec<Option<f64>> = table.rows().iter().map(|r| r.volatility).collect();
        assert_eq!(&vols[..2], &[None, None]);
        assert!((vols[2].unwrap() - 0.03 / 2f64.sqrt()).abs() < 1e-12);
        assert!((vols[3].unwrap() - 0.07 / 2f64.sqrt()).abs() < 1e-12);
        assert!((vols[4].unwrap() - 0.06 / 2f64.sqrt()).abs() < 1e-12);

        // mid cut at the smallest volatility puts day 2 in Medium
        let thresholds = RiskThresholds { mid_quantile: 0.0, high_quantile: 0.9 };
        let table = assign_risk_levels(table, VolatilityColumn::Realized, thresholds);
        let table = detect_market_regime(table, 0.9);

        let alerts = generate_risk_alerts(&table, DEFAULT_SPIKE_THRESHOLD);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].date, day(3));
        assert_eq!(
            alerts[0].alert,
            "Risk changed: Medium → High | Regime switched: Calm → Crisis | Volatility spike: 133.3%"
        );
        assert_eq!(alerts[0].risk_level, Some(RiskLevel::High));
        assert_eq!(alerts[1].date, day(4));
        assert_eq!(
            alerts[1].alert,
            "Risk changed: High → Medium | Regime switched: Crisis → Calm"
        );
    }

    #[test]
    fn messages_joined_in_fixed_order() {
        let rows = vec![
            row(0, RiskLevel::Low, MarketRegime::Calm, Some(0.01)),
            row(1, RiskLevel::High, MarketRegime::Crisis, Some(0.02)),
        ];
        let alerts = generate_risk_alerts(&RiskTable::from_rows(rows), DEFAULT_SPIKE_THRESHOLD);
        assert_eq!(alerts.len(), 1);
        assert_eq!(
            alerts[0].alert,
            "Risk changed: Low → High | Regime switched: Calm → Crisis | Volatility spike: 100.0%"
        );
    }

    #[test]
    fn unchanged_rows_are_silent() {
        let rows = vec![
            row(0, RiskLevel::Medium, MarketRegime::Calm, Some(0.02)),
            row(1, RiskLevel::Medium, MarketRegime::Calm, Some(0.029)),
            row(2, RiskLevel::Medium, MarketRegime::Calm, Some(0.01)),
        ];
        assert!(generate_risk_alerts(&RiskTable::from_rows(rows), DEFAULT_SPIKE_THRESHOLD).is_empty());
    }

    #[test]
    fn spike_threshold_is_inclusive() {
        let rows = vec![
            row(0, RiskLevel::Low, MarketRegime::Calm, Some(0.5)),
            row(1, RiskLevel::Low, MarketRegime::Calm, Some(0.75)),
        ];
        let alerts = generate_risk_alerts(&RiskTable::from_rows(rows), DEFAULT_SPIKE_THRESHOLD);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert, "Volatility spike: 50.0%");
    }

    #[test]
    fn zero_previous_volatility_never_spikes() {
        let rows = vec![
            row(0, RiskLevel::Low, MarketRegime::Calm, Some(0.0)),
            row(1, RiskLevel::Low, MarketRegime::Calm, Some(0.3)),
        ];
        assert!(generate_risk_alerts(&RiskTable::from_rows(rows), DEFAULT_SPIKE_THRESHOLD).is_empty());
    }

    #[test]
    fn flip_flop_alerts_every_flip() {
        let rows: Vec<RiskRow> = (0..6)
            .map(|i| {
                let level = if i % 2 == 0 { RiskLevel::Medium } else { RiskLevel::High };
                row(i, level, MarketRegime::Calm, Some(0.02))
            })
            .collect();
        let alerts = generate_risk_alerts(&RiskTable::from_rows(rows), DEFAULT_SPIKE_THRESHOLD);
        assert_eq!(alerts.len(), 5);
    }

    #[test]
    fn single_row_has_no_alert() {
        let rows = vec![row(0, RiskLevel::High, MarketRegime::Crisis, Some(0.5))];
        assert!(generate_risk_alerts(&RiskTable::from_rows(rows), DEFAULT_SPIKE_THRESHOLD).is_empty());
    }
}
