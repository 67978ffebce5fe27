//! Per-event counters for the resolution engine

use crate::LoadEvent;

#[derive(Debug, Default)]
pub struct LoadCounters {
    counts: [u64; LoadEvent::COUNT],
}

impl LoadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: LoadEvent) {
        self.counts[event.index()] += 1;
    }

    pub fn get(&self, event: LoadEvent) -> u64 {
        self.counts[event.index()]
    }

    pub fn reset(&mut self) {
        self.counts = [0; LoadEvent::COUNT];
    }

    /// Named counts in declaration order, for logging.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        LoadEvent::ALL
            .iter()
            .map(|&event| (event.name(), self.get(event)))
            .collect()
    }
}
