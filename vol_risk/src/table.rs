/// table.rs — The annotated observation table
///
/// One row per trading date.  Each pipeline stage fills exactly the columns it
/// owns and leaves the rest untouched; every cell is a single scalar or
/// undefined (`None`), never NaN.
use chrono::NaiveDate;

use crate::data::PriceTable;
use crate::models::hmm::HmmRegime;
use crate::regime::MarketRegime;
use crate::risk::{RiskLevel, VolatilityColumn};

#[derive(Debug, Clone, PartialEq)]
pub struct RiskRow {
    pub date:             NaiveDate,
    pub close:            f64,
    /// Simple return `close[t]/close[t-1] - 1`
    pub ret:              Option<f64>,
    /// Trailing realized volatility
    pub volatility:       Option<f64>,
    /// GARCH(1,1) conditional volatility, on the ×100 scale
    pub garch_volatility: Option<f64>,
    pub risk_level:       Option<RiskLevel>,
    pub market_regime:    Option<MarketRegime>,
    pub hmm_regime:       Option<HmmRegime>,
}

impl RiskRow {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            ret: None,
            volatility: None,
            garch_volatility: None,
            risk_level: None,
            market_regime: None,
            hmm_regime: None,
        }
    }

    pub fn vol(&self, column: VolatilityColumn) -> Option<f64> {
        match column {
            VolatilityColumn::Realized => self.volatility,
            VolatilityColumn::Conditional => self.garch_volatility,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RiskTable {
    rows: Vec<RiskRow>,
    hmm_column: bool,
}

impl RiskTable {
    pub fn from_prices(prices: &PriceTable) -> Self {
        let rows = prices.bars().iter().map(|b| RiskRow::new(b.date, b.close)).collect();
        Self { rows, hmm_column: false }
    }

    pub fn from_rows(rows: Vec<RiskRow>) -> Self {
        let hmm_column = rows.iter().any(|r| r.hmm_regime.is_some());
        Self { rows, hmm_column }
    }

    pub fn rows(&self) -> &[RiskRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [RiskRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest(&self) -> Option<&RiskRow> {
        self.rows.last()
    }

    /// Whether the statistical regime column was produced for this table.
    pub fn has_hmm_column(&self) -> bool {
        self.hmm_column
    }

    pub(crate) fn mark_hmm_column(&mut self) {
        self.hmm_column = true;
    }

    /// Defined values of one volatility column, in date order.
    pub fn vol_values(&self, column: VolatilityColumn) -> Vec<f64> {
        self.rows.iter().filter_map(|r| r.vol(column)).collect()
    }

    /// `(date, return)` for every row with a defined return.
    pub fn returns(&self) -> Vec<(NaiveDate, f64)> {
        self.rows.iter().filter_map(|r| r.ret.map(|x| (r.date, x))).collect()
    }

    /// Drop rows where any of the feature columns is undefined.
    pub fn drop_incomplete(self) -> Self {
        let rows = self
            .rows
            .into_iter()
            .filter(|r| r.ret.is_some() && r.volatility.is_some() && r.garch_volatility.is_some())
            .collect();
        Self { rows, hmm_column: self.hmm_column }
    }

    /// Rows dated within `[from, to]`, inclusive.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|r| r.date >= from && r.date <= to)
            .cloned()
            .collect();
        Self { rows, hmm_column: self.hmm_column }
    }

    /// Last `n` rows.
    pub fn tail(&self, n: usize) -> &[RiskRow] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }
}
