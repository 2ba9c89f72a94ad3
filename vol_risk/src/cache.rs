/// cache.rs — Per-(asset, start) memo of completed pipeline runs
///
/// Reporting surfaces ask for the snapshot, the history and the alerts of the
/// same run in quick succession; the run is computed once and shared as an
/// `Arc<PipelineOutput>`.  Only successful runs are stored, so a failed fit is
/// retried on the next request.
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::Result;
use crate::pipeline::PipelineOutput;

type CacheKey = (String, NaiveDate);

#[derive(Debug, Clone)]
struct CachedRun {
    output:      Arc<PipelineOutput>,
    computed_at: Instant,
}

#[derive(Debug, Default)]
pub struct PipelineCache {
    runs: DashMap<CacheKey, CachedRun>,
    /// `None` keeps entries until invalidated
    ttl:  Option<Duration>,
}

impl PipelineCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { runs: DashMap::new(), ttl }
    }

    fn is_fresh(&self, run: &CachedRun) -> bool {
        self.ttl.map_or(true, |ttl| run.computed_at.elapsed() < ttl)
    }

    /// Cached output for `(asset, start)`, running `compute` on a miss or an
    /// expired entry.
    pub fn get_or_run<F>(&self, asset: &str, start: NaiveDate, compute: F) -> Result<Arc<PipelineOutput>>
    where
        F: FnOnce() -> Result<PipelineOutput>,
    {
        let key = (asset.to_string(), start);
        // guard dropped before `compute` runs
        let hit = self.runs.get(&key).filter(|r| self.is_fresh(r)).map(|r| Arc::clone(&r.output));
        if let Some(output) = hit {
            debug!("Pipeline cache hit for {asset} from {start}");
            return Ok(output);
        }
        self.store(key, compute)
    }

    /// Recompute unconditionally and replace any cached entry.
    pub fn refresh<F>(&self, asset: &str, start: NaiveDate, compute: F) -> Result<Arc<PipelineOutput>>
    where
        F: FnOnce() -> Result<PipelineOutput>,
    {
        self.store((asset.to_string(), start), compute)
    }

    fn store<F>(&self, key: CacheKey, compute: F) -> Result<Arc<PipelineOutput>>
    where
        F: FnOnce() -> Result<PipelineOutput>,
    {
        let output = Arc::new(compute()?);
        info!("Caching pipeline run for {} from {}", key.0, key.1);
        self.runs.insert(
            key,
            CachedRun { output: Arc::clone(&output), computed_at: Instant::now() },
        );
        Ok(output)
    }

    pub fn invalidate(&self, asset: &str, start: NaiveDate) -> bool {
        self.runs.remove(&(asset.to_string(), start)).is_some()
    }

    pub fn clear(&self) {
        self.runs.clear();
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// TTL from a seconds setting; `0` disables expiry.
pub fn ttl_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

static GLOBAL: OnceLock<PipelineCache> = OnceLock::new();

/// Create the process-wide cache with the given expiry.  Only the first call
/// decides the TTL; later calls return the existing instance.
pub fn init_global(ttl: Option<Duration>) -> &'static PipelineCache {
    GLOBAL.get_or_init(|| {
        info!("Initialising process-wide pipeline cache (ttl={:?})", ttl);
        PipelineCache::new(ttl)
    })
}

/// Process-wide cache, created without expiry if `init_global` was never
/// called.
pub fn global() -> &'static PipelineCache {
    init_global(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FitStage, RiskError};
    use crate::models::garch::{Garch11, GarchFit};
    use crate::table::RiskTable;
    use std::cell::Cell;

    fn output() -> PipelineOutput {
        PipelineOutput {
            table:  RiskTable::default(),
            alerts: Vec::new(),
            garch:  GarchFit {
                model:                  Garch11::new(0.05, 0.08, 0.9, 1.0).unwrap(),
                log_likelihood:         -1.0,
                iterations:             1,
                conditional_volatility: Vec::new(),
            },
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let cache = PipelineCache::default();
        let calls = Cell::new(0);
        let run = || {
            calls.set(calls.get() + 1);
            Ok(output())
        };

        let a = cache.get_or_run("EEM", start(), run).unwrap();
        let b = cache.get_or_run("EEM", start(), run).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&a, &b));

        cache.get_or_run("SPY", start(), run).unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = PipelineCache::default();
        let err = cache
            .get_or_run("EEM", start(), || Err(RiskError::fit(FitStage::Hmm, "degenerate")))
            .unwrap_err();
        assert_eq!(err.fit_stage(), Some(FitStage::Hmm));
        assert!(cache.is_empty());
    }

    #[test]
    fn refresh_and_invalidate() {
        let cache = PipelineCache::default();
        let calls = Cell::new(0);
        let run = || {
            calls.set(calls.get() + 1);
            Ok(output())
        };

        cache.get_or_run("EEM", start(), run).unwrap();
        cache.refresh("EEM", start(), run).unwrap();
        assert_eq!(calls.get(), 2);

        assert!(cache.invalidate("EEM", start()));
        assert!(!cache.invalidate("EEM", start()));
        cache.get_or_run("EEM", start(), run).unwrap();
        assert_eq!(calls.get(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_seconds_means_no_expiry() {
        assert_eq!(ttl_from_secs(0), None);
        assert_eq!(ttl_from_secs(3_600), Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn global_cache_is_one_shared_instance() {
        let a = init_global(None);
        let b = global();
        assert!(std::ptr::eq(a, b));

        // key unique to this test; the instance is shared process-wide
        let calls = Cell::new(0);
        let run = || {
            calls.set(calls.get() + 1);
            Ok(output())
        };
        let first = global().get_or_run("global-cache-test", start(), run).unwrap();
        let hit = a.get_or_run("global-cache-test", start(), run).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &hit));

        let fresh = b.refresh("global-cache-test", start(), run).unwrap();
        assert_eq!(calls.get(), 2);
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(global().invalidate("global-cache-test", start()));
    }

    #[test]
    fn expired_entries_are_recomputed() {
        let cache = PipelineCache::new(Some(Duration::ZERO));
        let calls = Cell::new(0);
        let run = || {
            calls.set(calls.get() + 1);
            Ok(output())
        };
        cache.get_or_run("EEM", start(), run).unwrap();
        cache.get_or_run("EEM", start(), run).unwrap();
        assert_eq!(calls.get(), 2);
    }
}
