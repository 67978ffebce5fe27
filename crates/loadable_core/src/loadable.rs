//! One handle per requested unit
//!
//! A [`Loadable`] ties together eager lookup, deferred acquisition and usage
//! recording for a single unit. Clones share the same state.

use crate::acquire::Acquisition;
use crate::deferred::{Begin, DeferredResolver, InstanceState, LoadState};
use crate::eager::EagerResolver;
use crate::error::LoadError;
use crate::host::{HostContext, Locator, Source};
use crate::ledger::UsageLedger;
use crate::options::LoadableOptions;
use crate::unit::Export;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub struct Loadable<P = ()> {
    inner: Arc<Inner<P>>,
}

struct Inner<P> {
    locator: Locator<P>,
    eager: EagerResolver,
    deferred: DeferredResolver<P>,
    chunk_name: Option<Source<P>>,
    ledger: Arc<UsageLedger>,
    state: Arc<Mutex<InstanceState>>,
    eager_value: Option<Export>,
}

impl<P: 'static> Loadable<P> {
    /// Build an instance and, unless disabled, try the eager path once with
    /// `props`.
    pub fn new(
        acquisition: Acquisition<P>,
        options: LoadableOptions<P>,
        context: &HostContext,
        props: &P,
    ) -> Self {
        let options = options.validated();
        let locator = Locator {
            host: context.host.clone(),
            id: options.id,
            path: options.path,
        };
        let eager = EagerResolver {
            selector: options.selector.clone(),
            on_load: options.on_load.clone(),
            metrics: options.metrics.clone(),
        };
        let deferred = DeferredResolver {
            acquisition,
            selector: options.selector,
            timeout: options.timeout,
            on_load: options.on_load,
            on_error: options.on_error,
            always_refresh: options.always_refresh,
            metrics: options.metrics,
        };

        let mut state = InstanceState::default();
        let eager_value = if !options.eager {
            None
        } else if !locator.can_lookup() {
            tracing::debug!("no id or path configured, skipping eager resolution");
            None
        } else {
            eager.resolve(&locator, props).map(|hit| {
                state.cache(hit.value.clone(), hit.module_id);
                hit.value
            })
        };

        Self {
            inner: Arc::new(Inner {
                locator,
                eager,
                deferred,
                chunk_name: options.chunk_name,
                ledger: context.ledger.clone(),
                state: Arc::new(Mutex::new(state)),
                eager_value,
            }),
        }
    }

    /// The value found by the eager attempt at construction, if any.
    pub fn eager_value(&self) -> Option<Export> {
        self.inner.eager_value.clone()
    }

    /// The cached value, or a fresh eager lookup if nothing is cached yet.
    ///
    /// `None` means "not yet available", never failure.
    pub fn require_sync(&self, props: &P) -> Option<Export> {
        let cached = self.inner.state.lock().value();
        if cached.is_some() && !self.inner.deferred.always_refresh {
            return cached;
        }

        let Some(hit) = self.inner.eager.resolve(&self.inner.locator, props) else {
            return cached;
        };
        self.inner.state.lock().cache(hit.value.clone(), hit.module_id);
        Some(hit.value)
    }

    /// Resolve the unit, starting an acquisition if nothing is cached or in
    /// flight. The acquisition starts when this is called and runs on the
    /// current runtime even if the returned future is awaited late or dropped.
    pub fn require_async(
        &self,
        props: &P,
    ) -> impl Future<Output = Result<Export, LoadError>> + Send + 'static {
        let begin = self.begin(props);
        async move {
            match begin {
                Begin::Cached(value) => Ok(value),
                Begin::Attempt(attempt) => attempt.await,
            }
        }
    }

    /// Start resolving in the background without waiting for the result.
    ///
    /// Outside a tokio runtime the attempt only makes progress once a later
    /// `require_async` awaits it.
    pub fn preload(&self, props: &P) {
        if let Begin::Cached(_) = self.begin(props) {
            tracing::trace!("preload skipped, value already cached");
        }
    }

    /// Record this unit in the usage ledger.
    ///
    /// Records the chunk name (if configured) and whichever identifier has
    /// been resolved so far. Repeat calls are harmless.
    pub fn record_usage(&self, props: &P) {
        if let Some(name) = self
            .inner
            .chunk_name
            .as_ref()
            .and_then(|source| source.resolve(props))
        {
            self.inner.ledger.record_chunk_name(name);
        }
        if let Some(id) = self.resolved_id() {
            self.inner.ledger.record_module_id(id);
        }
    }

    pub fn state(&self) -> LoadState {
        self.inner.state.lock().load_state()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().value().is_some()
    }

    /// The identifier the unit was resolved under, once known.
    pub fn resolved_id(&self) -> Option<String> {
        self.inner.state.lock().resolved_id()
    }

    fn begin(&self, props: &P) -> Begin {
        let module_id = self.inner.locator.module_id(props);
        let context = self.inner.locator.context(false);
        self.inner
            .deferred
            .begin(&self.inner.state, props, module_id, context)
    }
}

impl<P> Clone for Loadable<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P> fmt::Debug for Loadable<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Loadable")
            .field("state", &state.load_state())
            .field("resolved_id", &state.resolved_id())
            .field("acquisition", &self.inner.deferred.acquisition)
            .finish()
    }
}
