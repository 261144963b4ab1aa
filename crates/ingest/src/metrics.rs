use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Clone, Default)]
pub struct IngestMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    batches: AtomicU64,
    rejected_batches: AtomicU64,
    raw_events: AtomicU64,
    canonical_events: AtomicU64,
    skipped_unlinked: AtomicU64,
    skipped_untranslatable: AtomicU64,
    persistence_failures: AtomicU64,
}

impl IngestMetrics {
    pub fn inc_batches(&self, delta: u64) {
        self.inner.batches.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_rejected_batches(&self, delta: u64) {
        self.inner.rejected_batches.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_raw_events(&self, delta: u64) {
        self.inner.raw_events.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_canonical_events(&self, delta: u64) {
        self.inner.canonical_events.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_skipped_unlinked(&self, delta: u64) {
        self.inner.skipped_unlinked.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_skipped_untranslatable(&self, delta: u64) {
        self.inner
            .skipped_untranslatable
            .fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_persistence_failures(&self, delta: u64) {
        self.inner
            .persistence_failures
            .fetch_add(delta, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches: self.inner.batches.load(Ordering::Relaxed),
            rejected_batches: self.inner.rejected_batches.load(Ordering::Relaxed),
            raw_events: self.inner.raw_events.load(Ordering::Relaxed),
            canonical_events: self.inner.canonical_events.load(Ordering::Relaxed),
            skipped_unlinked: self.inner.skipped_unlinked.load(Ordering::Relaxed),
            skipped_untranslatable: self.inner.skipped_untranslatable.load(Ordering::Relaxed),
            persistence_failures: self.inner.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches: u64,
    pub rejected_batches: u64,
    pub raw_events: u64,
    pub canonical_events: u64,
    pub skipped_unlinked: u64,
    pub skipped_untranslatable: u64,
    pub persistence_failures: u64,
}

impl MetricsSnapshot {
    pub fn to_json_line(&self, label: &str, elapsed: Option<Duration>) -> String {
        #[derive(Serialize)]
        struct Line<'a> {
            label: &'a str,
            #[serde(flatten)]
            counters: &'a MetricsSnapshot,
            elapsed_ms: Option<u128>,
        }

        let line = Line {
            label,
            counters: self,
            elapsed_ms: elapsed.map(|d| d.as_millis()),
        };
        serde_json::to_string(&line).unwrap_or_else(|_| String::from("{}"))
    }
}

pub struct RoundTimer {
    start: Instant,
}

impl RoundTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
