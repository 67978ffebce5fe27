//! Shared metrics sink for loader instances

use loadable_metrics::{LatencyWindow, LoadCounters, LoadEvent};
use parking_lot::Mutex;
use std::time::Duration;

/// Counters and attempt latencies, shared by every instance of a context.
///
/// Compiles down to no-ops without the `metrics` feature.
#[derive(Debug, Default)]
pub struct LoaderMetrics {
    counters: Mutex<LoadCounters>,
    latency: Mutex<LatencyWindow>,
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(LoadCounters::new()),
            latency: Mutex::new(LatencyWindow::new(64)),
        }
    }

    pub fn record(&self, event: LoadEvent) {
        self.counters.lock().record(event);
    }

    pub fn observe_attempt(&self, elapsed: Duration) {
        self.latency.lock().push(elapsed);
    }

    pub fn count(&self, event: LoadEvent) -> u64 {
        self.counters.lock().get(event)
    }

    pub fn average_attempt_ms(&self) -> f64 {
        self.latency.lock().average_ms()
    }

    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.counters.lock().snapshot()
    }
}
