//! Loadable Metrics - counters and latency tracking for unit resolution
//!
//! Provides zero-cost abstractions for metrics collection that completely
//! vanish in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use loadable_metrics::{LatencyWindow, LoadCounters, LoadEvent};
//!
//! let mut counters = LoadCounters::new();
//! counters.record(LoadEvent::Attempt);
//!
//! let mut window = LatencyWindow::new(64); // Track last 64 attempts
//! window.push(std::time::Duration::from_millis(12));
//! println!("avg: {:.1}ms", window.average_ms());
//! ```
//!
//! Without the `metrics` feature every call is a no-op.

#[cfg(feature = "metrics")]
mod counters;
#[cfg(feature = "metrics")]
mod latency;

#[cfg(feature = "metrics")]
pub use counters::LoadCounters;
#[cfg(feature = "metrics")]
pub use latency::LatencyWindow;

/// Events the resolution engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadEvent {
    /// A new deferred acquisition was started.
    Attempt,
    /// A caller joined an attempt already in flight.
    Join,
    /// A cached value was returned without new work.
    CacheHit,
    /// An attempt exceeded its deadline.
    Timeout,
    /// An attempt failed for any other reason.
    Failure,
    /// An eager lookup produced a value.
    EagerHit,
    /// An eager lookup found nothing (yet).
    EagerMiss,
}

impl LoadEvent {
    pub const COUNT: usize = 7;

    pub const ALL: [LoadEvent; Self::COUNT] = [
        LoadEvent::Attempt,
        LoadEvent::Join,
        LoadEvent::CacheHit,
        LoadEvent::Timeout,
        LoadEvent::Failure,
        LoadEvent::EagerHit,
        LoadEvent::EagerMiss,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LoadEvent::Attempt => "attempts",
            LoadEvent::Join => "joins",
            LoadEvent::CacheHit => "cache_hits",
            LoadEvent::Timeout => "timeouts",
            LoadEvent::Failure => "failures",
            LoadEvent::EagerHit => "eager_hits",
            LoadEvent::EagerMiss => "eager_misses",
        }
    }

    #[allow(dead_code)]
    fn index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct LoadCounters;

#[cfg(not(feature = "metrics"))]
impl LoadCounters {
    pub fn new() -> Self { Self }
    pub fn record(&mut self, _event: LoadEvent) {}
    pub fn get(&self, _event: LoadEvent) -> u64 { 0 }
    pub fn reset(&mut self) {}
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> { Vec::new() }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct LatencyWindow;

#[cfg(not(feature = "metrics"))]
impl LatencyWindow {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn push(&mut self, _sample: std::time::Duration) {}
    pub fn len(&self) -> usize { 0 }
    pub fn is_empty(&self) -> bool { true }
    pub fn average(&self) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn average_ms(&self) -> f64 { 0.0 }
    pub fn max(&self) -> std::time::Duration { std::time::Duration::ZERO }
}
