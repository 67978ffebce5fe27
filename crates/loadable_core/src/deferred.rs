//! Deferred (asynchronous) resolution
//!
//! Each instance runs at most one acquisition at a time. Callers that arrive
//! while it is pending join the same shared attempt and observe the same
//! outcome. Successes are cached; failures are not, so the next call starts
//! a fresh attempt.

use crate::acquire::{AcquireError, Acquisition, RawFuture};
use crate::error::LoadError;
use crate::host::LoadContext;
use crate::metrics::LoaderMetrics;
use crate::options::{ErrorHook, LoadHook};
use crate::selector::{select_export, ExportSelector};
use crate::unit::Export;
use futures::future::{BoxFuture, FutureExt, Shared};
use loadable_metrics::LoadEvent;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub type SharedAttempt = Shared<BoxFuture<'static, Result<Export, LoadError>>>;

/// Where an instance is in its resolution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing cached and nothing in flight.
    Idle,
    /// An acquisition is in flight.
    Pending,
    /// A value is cached.
    Resolved,
    /// The latest attempt failed. The next `require_async` retries.
    Failed,
}

struct InFlight {
    generation: u64,
    attempt: SharedAttempt,
}

/// Mutable state shared by every handle to one instance.
#[derive(Default)]
pub(crate) struct InstanceState {
    value: Option<Export>,
    resolved_id: Option<String>,
    in_flight: Option<InFlight>,
    last_failed: bool,
    generation: u64,
}

impl InstanceState {
    pub fn value(&self) -> Option<Export> {
        self.value.clone()
    }

    pub fn resolved_id(&self) -> Option<String> {
        self.resolved_id.clone()
    }

    pub fn load_state(&self) -> LoadState {
        if self.in_flight.is_some() {
            LoadState::Pending
        } else if self.value.is_some() {
            LoadState::Resolved
        } else if self.last_failed {
            LoadState::Failed
        } else {
            LoadState::Idle
        }
    }

    /// Cache a value found by the eager path.
    pub fn cache(&mut self, value: Export, module_id: String) {
        self.value = Some(value);
        self.resolved_id = Some(module_id);
        self.last_failed = false;
    }

    fn settle(
        &mut self,
        generation: u64,
        result: &Result<Export, LoadError>,
        module_id: Option<String>,
    ) {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation);
        if current {
            self.in_flight = None;
        }

        match result {
            Ok(value) => {
                self.value = Some(value.clone());
                self.last_failed = false;
                if module_id.is_some() {
                    self.resolved_id = module_id;
                }
            }
            Err(_) if current => self.last_failed = true,
            Err(_) => {}
        }
    }
}

/// What a caller gets back without waiting.
pub(crate) enum Begin {
    Cached(Export),
    Attempt(SharedAttempt),
}

pub(crate) struct DeferredResolver<P> {
    pub acquisition: Acquisition<P>,
    pub selector: ExportSelector,
    pub timeout: Option<Duration>,
    pub on_load: Option<LoadHook>,
    pub on_error: Option<ErrorHook>,
    pub always_refresh: bool,
    pub metrics: Option<Arc<LoaderMetrics>>,
}

impl<P: 'static> DeferredResolver<P> {
    /// Return the cached value, join the attempt in flight, or start one.
    pub fn begin(
        &self,
        state: &Arc<Mutex<InstanceState>>,
        props: &P,
        module_id: Option<String>,
        context: LoadContext,
    ) -> Begin {
        let logged_id = module_id.clone();
        let (raw_tx, attempt, generation) = {
            let mut guard = state.lock();
            if !self.always_refresh {
                if let Some(value) = &guard.value {
                    self.record(LoadEvent::CacheHit);
                    return Begin::Cached(value.clone());
                }
                if let Some(in_flight) = &guard.in_flight {
                    self.record(LoadEvent::Join);
                    return Begin::Attempt(in_flight.attempt.clone());
                }
            }

            guard.generation += 1;
            let generation = guard.generation;
            let (raw_tx, raw_rx) = oneshot::channel();
            let attempt = self.attempt(generation, raw_rx, Arc::downgrade(state), module_id, context);
            guard.in_flight = Some(InFlight {
                generation,
                attempt: attempt.clone(),
            });
            (raw_tx, attempt, generation)
        };

        // The acquisition runs outside the lock so it may call back into the instance.
        self.record(LoadEvent::Attempt);
        tracing::info!(generation, module_id = ?logged_id, timeout = ?self.timeout, "starting acquisition");
        if raw_tx.send(self.acquisition.start(props)).is_err() {
            tracing::trace!("attempt dropped before its acquisition started");
        }

        // Drive the attempt alongside its deadline, whether or not a caller awaits it.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let driven = attempt.clone();
                handle.spawn(async move {
                    let _ = driven.await;
                });
            }
            Err(_) => tracing::trace!(generation, "no async runtime, attempt runs when awaited"),
        }
        Begin::Attempt(attempt)
    }

    fn attempt(
        &self,
        generation: u64,
        raw_rx: oneshot::Receiver<RawFuture>,
        state: Weak<Mutex<InstanceState>>,
        module_id: Option<String>,
        context: LoadContext,
    ) -> SharedAttempt {
        // Fixed at attempt start; callers joining later only wait the remainder.
        let deadline = self.timeout.map(|timeout| (Instant::now() + timeout, timeout));
        let selector = self.selector.clone();
        let on_load = self.on_load.clone();
        let on_error = self.on_error.clone();
        let metrics = self.metrics.clone();

        async move {
            let started = Instant::now();
            let raw = async move {
                match raw_rx.await {
                    Ok(raw) => raw.await,
                    Err(_) => Err(Arc::new(AcquireError::Abandoned)),
                }
            };
            let outcome = match deadline {
                Some((deadline, timeout)) => tokio::time::timeout_at(deadline, raw)
                    .await
                    .map_err(|_| LoadError::TimeoutExceeded { timeout }),
                None => Ok(raw.await),
            };

            let result = match outcome {
                Err(timed_out) => Err(timed_out),
                Ok(Err(err)) => Err(LoadError::AcquisitionFailed(err)),
                Ok(Ok(module)) => {
                    if let Some(hook) = &on_load {
                        hook(&module, context);
                    }
                    select_export(&module, &selector).ok_or_else(|| LoadError::ExportNotFound {
                        selector: selector.to_string(),
                    })
                }
            };

            if let Some(metrics) = &metrics {
                metrics.observe_attempt(started.elapsed());
                match &result {
                    Err(err) if err.is_timeout() => metrics.record(LoadEvent::Timeout),
                    Err(_) => metrics.record(LoadEvent::Failure),
                    Ok(_) => {}
                }
            }

            match &result {
                Ok(_) => tracing::info!(generation, elapsed = ?started.elapsed(), "acquisition resolved"),
                Err(err) => {
                    tracing::warn!(generation, %err, "acquisition failed");
                    if let Some(hook) = &on_error {
                        hook(err, context);
                    }
                }
            }

            if let Some(state) = state.upgrade() {
                state.lock().settle(generation, &result, module_id);
            }
            result
        }
        .boxed()
        .shared()
    }

    fn record(&self, event: LoadEvent) {
        if let Some(metrics) = &self.metrics {
            metrics.record(event);
        }
    }
}
