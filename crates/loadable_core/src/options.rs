//! Per-instance configuration

use crate::config::{LoaderSettings, DEFAULT_TIMEOUT_MS};
use crate::error::LoadError;
use crate::host::{LoadContext, Source};
use crate::metrics::LoaderMetrics;
use crate::selector::ExportSelector;
use crate::unit::Module;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Called with the whole unit each time one is obtained, before selection.
pub type LoadHook = Arc<dyn Fn(&Arc<Module>, LoadContext) + Send + Sync>;

/// Called before a deferred failure is returned to callers.
pub type ErrorHook = Arc<dyn Fn(&LoadError, LoadContext) + Send + Sync>;

/// Configuration for one [`Loadable`](crate::Loadable).
///
/// Everything is optional; an instance with neither `id` nor `path` can only
/// resolve through its acquisition.
pub struct LoadableOptions<P = ()> {
    /// Key into the host's identifier registry.
    pub id: Option<Source<P>>,
    /// Key into the host's path registry, used when no identifier registry
    /// is available.
    pub path: Option<Source<P>>,
    pub selector: ExportSelector,
    /// Ledger tag only; plays no part in resolution.
    pub chunk_name: Option<Source<P>>,
    /// `None` disables the timer.
    pub timeout: Option<Duration>,
    pub on_load: Option<LoadHook>,
    pub on_error: Option<ErrorHook>,
    /// Try the eager path once at construction.
    pub eager: bool,
    /// Start a fresh acquisition on every `require_async`.
    pub always_refresh: bool,
    pub metrics: Option<Arc<LoaderMetrics>>,
}

impl<P> Default for LoadableOptions<P> {
    fn default() -> Self {
        Self {
            id: None,
            path: None,
            selector: ExportSelector::Default,
            chunk_name: None,
            timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            on_load: None,
            on_error: None,
            eager: true,
            always_refresh: false,
            metrics: None,
        }
    }
}

impl<P> LoadableOptions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &LoaderSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            eager: settings.eager,
            always_refresh: settings.always_refresh,
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<Source<P>>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn path(mut self, path: impl Into<Source<P>>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn export(mut self, selector: impl Into<ExportSelector>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn chunk_name(mut self, name: impl Into<Source<P>>) -> Self {
        self.chunk_name = Some(name.into());
        self
    }

    /// A zero duration disables the timer, same as `None`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|timeout| !timeout.is_zero());
        self
    }

    pub fn timeout_ms(self, ms: u64) -> Self {
        self.timeout(Some(Duration::from_millis(ms)))
    }

    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Module>, LoadContext) + Send + Sync + 'static,
    {
        self.on_load = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoadError, LoadContext) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn always_refresh(mut self, always_refresh: bool) -> Self {
        self.always_refresh = always_refresh;
        self
    }

    pub fn metrics(mut self, metrics: Arc<LoaderMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Normalize values that were assigned to the public fields directly.
    pub(crate) fn validated(mut self) -> Self {
        self.timeout = self.timeout.filter(|timeout| !timeout.is_zero());
        self
    }
}

impl<P> fmt::Debug for LoadableOptions<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableOptions")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("selector", &self.selector)
            .field("chunk_name", &self.chunk_name)
            .field("timeout", &self.timeout)
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("eager", &self.eager)
            .field("always_refresh", &self.always_refresh)
            .finish()
    }
}
