/// features.rs — Return / realized volatility feature builder
///
///   Return:              r_t = C_t / C_{t-1} − 1        (undefined at t = 0)
///   Realized volatility: σ_t = stdev(r_{t-w+1} … r_t)   (sample, n−1 divisor)
///
/// σ_t is undefined until `w` returns exist, i.e. for the first `w` rows.
/// Downstream stages drop undefined rows; they never read them as zero.
use statrs::statistics::Statistics;
use tracing::debug;

use crate::table::RiskTable;

/// Default rolling window (trading days).
pub const DEFAULT_VOL_WINDOW: usize = 20;

/// Fill the `Return` column.
pub fn compute_returns(mut table: RiskTable) -> RiskTable {
    let rows = table.rows_mut();
    for i in 1..rows.len() {
        let prev = rows[i - 1].close;
        rows[i].ret = Some(rows[i].close / prev - 1.0);
    }
    table
}

/// Fill the realized `Volatility` column with a trailing `window` stdev of
/// returns.
pub fn compute_volatility(mut table: RiskTable, window: usize) -> RiskTable {
    let rows = table.rows_mut();
    let mut buf: Vec<f64> = Vec::with_capacity(window);
    let mut defined = 0usize;

    for i in 0..rows.len() {
        rows[i].volatility = None;
        if i < window {
            continue;
        }
        buf.clear();
        buf.extend(rows[i + 1 - window..=i].iter().filter_map(|r| r.ret));
        if buf.len() == window {
            let sd = buf.iter().std_dev();
            if sd.is_finite() {
                rows[i].volatility = Some(sd);
                defined += 1;
            }
        }
    }

    debug!("Realized volatility: window={} defined_rows={}", window, defined);
    table
}
