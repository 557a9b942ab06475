//! Pluggable observer for batch pages and rankings.
//!
//! Install an implementation once at startup with [`set_batch_metrics`]; every
//! subsequent call through [`crate::compute_missing`] and [`crate::rank`]
//! reports to it. With no recorder installed nothing is measured.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

/// What happened to one fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub fetched: usize,
    pub computed: usize,
    pub skipped: usize,
    /// Rows the store actually inserted.
    pub persisted: usize,
}

pub trait BatchMetrics: Send + Sync {
    fn record_page(&self, space: &str, latency: Duration, result: Result<PageOutcome, ()>);
    fn record_rank(&self, space: &str, latency: Duration, result: Result<usize, ()>);
}

/// Install or clear the global recorder.
pub fn set_batch_metrics(recorder: Option<Arc<dyn BatchMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn BatchMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn BatchMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn BatchMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn BatchMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record_page(self, space: &str, result: Result<PageOutcome, ()>) {
        self.recorder
            .record_page(space, self.start.elapsed(), result);
    }

    pub(crate) fn record_rank(self, space: &str, result: Result<usize, ()>) {
        self.recorder
            .record_rank(space, self.start.elapsed(), result);
    }
}
