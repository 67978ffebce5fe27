//! Host module system seam
//!
//! The host owns whatever in-memory registry units land in. The engine only
//! asks it two questions: is the identifier registry live, and is this unit
//! resident right now.

use crate::error::HostError;
use crate::ledger::UsageLedger;
use crate::unit::Module;
use std::fmt;
use std::sync::Arc;

/// The host's module system.
pub trait ModuleHost: Send + Sync {
    /// Whether this process renders on the server side.
    fn is_server(&self) -> bool;

    /// Whether an identifier-keyed registry is available right now.
    fn has_id_registry(&self) -> bool;

    /// Look up a resident unit by identifier. `Ok(None)` is a plain miss.
    fn require_by_id(&self, id: &str) -> Result<Option<Arc<Module>>, HostError>;

    /// Look up a resident unit by path. `Ok(None)` is a plain miss.
    fn require_by_path(&self, path: &str) -> Result<Option<Arc<Module>>, HostError>;
}

/// A string known up front or computed from the request arguments.
pub enum Source<P = ()> {
    Static(String),
    Computed(Arc<dyn Fn(&P) -> Option<String> + Send + Sync>),
}

impl<P> Source<P> {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&P) -> Option<String> + Send + Sync + 'static,
    {
        Source::Computed(Arc::new(f))
    }

    /// Empty strings count as absent.
    pub fn resolve(&self, props: &P) -> Option<String> {
        let value = match self {
            Source::Static(value) => Some(value.clone()),
            Source::Computed(f) => f(props),
        };
        value.filter(|value| !value.is_empty())
    }
}

impl<P> Clone for Source<P> {
    fn clone(&self) -> Self {
        match self {
            Source::Static(value) => Source::Static(value.clone()),
            Source::Computed(f) => Source::Computed(f.clone()),
        }
    }
}

impl<P> fmt::Debug for Source<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Source::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl<P> From<&str> for Source<P> {
    fn from(value: &str) -> Self {
        Source::Static(value.to_string())
    }
}

impl<P> From<String> for Source<P> {
    fn from(value: String) -> Self {
        Source::Static(value)
    }
}

/// Passed to load and error hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadContext {
    pub is_server: bool,
    /// True when the unit came from the eager (synchronous) path.
    pub is_sync: bool,
}

/// What one request/response cycle shares between its instances.
#[derive(Clone)]
pub struct HostContext {
    pub host: Arc<dyn ModuleHost>,
    pub ledger: Arc<UsageLedger>,
}

impl HostContext {
    pub fn new(host: Arc<dyn ModuleHost>, ledger: Arc<UsageLedger>) -> Self {
        Self { host, ledger }
    }
}

/// How an instance finds its unit in the host registries.
pub(crate) struct Locator<P> {
    pub host: Arc<dyn ModuleHost>,
    pub id: Option<Source<P>>,
    pub path: Option<Source<P>>,
}

impl<P> Locator<P> {
    /// The identifier this unit is tracked under: the registry id when the
    /// host has an identifier registry, its path otherwise.
    pub fn module_id(&self, props: &P) -> Option<String> {
        self.key(props, self.host.has_id_registry())
    }

    fn key(&self, props: &P, by_id: bool) -> Option<String> {
        let source = if by_id { &self.id } else { &self.path };
        source.as_ref()?.resolve(props)
    }

    pub fn can_lookup(&self) -> bool {
        self.id.is_some() || self.path.is_some()
    }

    /// Returns the resident unit and the key it was found under.
    pub fn lookup(&self, props: &P) -> Result<Option<(Arc<Module>, String)>, HostError> {
        // Key and registry must agree even if the host switches mid-lookup.
        let by_id = self.host.has_id_registry();
        let Some(key) = self.key(props, by_id) else {
            return Ok(None);
        };
        let found = if by_id {
            self.host.require_by_id(&key)?
        } else {
            self.host.require_by_path(&key)?
        };
        Ok(found.map(|module| (module, key)))
    }

    pub fn context(&self, is_sync: bool) -> LoadContext {
        LoadContext {
            is_server: self.host.is_server(),
            is_sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports an identifier registry only on the first query.
    struct FlippingHost {
        queries: AtomicUsize,
    }

    impl ModuleHost for FlippingHost {
        fn is_server(&self) -> bool {
            true
        }

        fn has_id_registry(&self) -> bool {
            self.queries.fetch_add(1, Ordering::SeqCst) == 0
        }

        fn require_by_id(&self, id: &str) -> Result<Option<Arc<Module>>, HostError> {
            Ok((id == "7").then(|| Module::es_module().with_default(7u8).into_shared()))
        }

        fn require_by_path(&self, _path: &str) -> Result<Option<Arc<Module>>, HostError> {
            Ok(None)
        }
    }

    #[test]
    fn lookup_reads_the_registry_flag_once() {
        let locator: Locator<()> = Locator {
            host: Arc::new(FlippingHost {
                queries: AtomicUsize::new(0),
            }),
            id: Some("7".into()),
            path: Some("./Seven.js".into()),
        };

        let (_, key) = locator.lookup(&()).unwrap().expect("found under its id");
        assert_eq!(key, "7");
    }

    #[test]
    fn empty_sources_resolve_to_none() {
        let empty: Source<()> = "".into();
        assert_eq!(empty.resolve(&()), None);

        let computed = Source::<u32>::computed(|page| Some(format!("page-{page}")));
        assert_eq!(computed.resolve(&7).as_deref(), Some("page-7"));
    }
}
