/// data.rs — Price table input
///
/// The pipeline consumes one ordered table of daily bars for a single asset.
/// Fetching bars from a market-data vendor is someone else's job; this module
/// only validates what it is given and can read a local CSV export.
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{InputError, Result};

/// One trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date:   NaiveDate,
    pub open:   Option<f64>,
    pub high:   Option<f64>,
    pub low:    Option<f64>,
    pub close:  f64,
    pub volume: Option<f64>,
}

impl PriceBar {
    /// Bar with only a close, which is all the pipeline reads.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self { date, open: None, high: None, low: None, close, volume: None }
    }
}

/// Validated, date-ordered price history.  Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    bars: Vec<PriceBar>,
}

impl PriceTable {
    /// Validate the input contract: non-empty, strictly increasing dates,
    /// finite positive closes.
    pub fn new(bars: Vec<PriceBar>) -> std::result::Result<Self, InputError> {
        if bars.is_empty() {
            return Err(InputError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(InputError::InvalidClose { date: bar.date, close: bar.close });
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(InputError::NonMonotonicDates {
                    prev: bars[i - 1].date,
                    date: bar.date,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Convenience constructor from `(date, close)` pairs.
    pub fn from_closes(
        closes: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> std::result::Result<Self, InputError> {
        Self::new(closes.into_iter().map(|(d, c)| PriceBar::from_close(d, c)).collect())
    }

    /// Keep bars dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> std::result::Result<Self, InputError> {
        let bars: Vec<PriceBar> = self.bars.iter().filter(|b| b.date >= start).cloned().collect();
        Self::new(bars)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }
}

// ── CSV loading ───────────────────────────────────────────────────────────

/// Load a daily bar CSV (`Date,Open,High,Low,Close,Volume`).
///
/// Rows whose close is missing or non-numeric are dropped before validation,
/// which also skips the extra header lines some vendor exports carry.
pub fn load_csv(path: &Path) -> Result<PriceTable> {
    info!("Loading price history from {}", path.display());

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    for required in ["Date", "Close"] {
        if df.get_column_index(required).is_none() {
            return Err(InputError::MissingColumn(required.to_owned()).into());
        }
    }

    let dates = df.column("Date")?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let closes = df.column("Close")?.cast(&DataType::Float64)?;
    let closes = closes.f64()?;

    let opens = optional_f64(&df, "Open")?;
    let highs = optional_f64(&df, "High")?;
    let lows = optional_f64(&df, "Low")?;
    let volumes = optional_f64(&df, "Volume")?;

    let mut bars = Vec::with_capacity(df.height());
    let mut dropped = 0usize;

    for i in 0..df.height() {
        let Some(close) = closes.get(i) else {
            dropped += 1;
            continue;
        };
        let raw_date = dates.get(i).unwrap_or_default();
        let date = parse_date(raw_date)?;

        bars.push(PriceBar {
            date,
            open:   pick(&opens, i),
            high:   pick(&highs, i),
            low:    pick(&lows, i),
            close,
            volume: pick(&volumes, i),
        });
    }

    if dropped > 0 {
        warn!("Dropped {} rows without a close", dropped);
    }
    debug!("Parsed {} bars", bars.len());

    Ok(PriceTable::new(bars)?)
}

fn optional_f64(df: &DataFrame, name: &str) -> PolarsResult<Option<Vec<Option<f64>>>> {
    if df.get_column_index(name).is_none() {
        return Ok(None);
    }
    let col = df.column(name)?.cast(&DataType::Float64)?;
    Ok(Some(col.f64()?.into_iter().collect()))
}

fn pick(col: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    col.as_ref().and_then(|c| c.get(i).copied().flatten())
}

/// Accepts `YYYY-MM-DD` optionally followed by a time component.
pub(crate) fn parse_date(raw: &str) -> std::result::Result<NaiveDate, InputError> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| InputError::BadDate(raw.to_owned()))
}
