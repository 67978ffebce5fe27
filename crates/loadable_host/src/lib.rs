//! Loadable Host
//!
//! In-memory module host: an identifier registry, a path registry, and a
//! staging area for units that only become resident once their chunk has
//! been "fetched".

use dashmap::DashMap;
use loadable_core::{
    AcquireError, Acquisition, ExecutionContext, HostError, Module, ModuleHost,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A registry entry. Broken entries fail on lookup, like a module whose
/// factory throws.
#[derive(Debug, Clone)]
enum Resident {
    Ready(Arc<Module>),
    Broken(String),
}

#[derive(Debug, Clone)]
struct Staged {
    module: Arc<Module>,
    path: Option<String>,
}

/// Module host backed by concurrent maps.
#[derive(Debug)]
pub struct MemoryHost {
    context: ExecutionContext,
    id_registry: AtomicBool,
    by_id: DashMap<String, Resident>,
    by_path: DashMap<String, Resident>,
    staged: DashMap<String, Staged>,
    next_id: AtomicU64,
    fetches: AtomicUsize,
}

impl MemoryHost {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            id_registry: AtomicBool::new(true),
            by_id: DashMap::new(),
            by_path: DashMap::new(),
            staged: DashMap::new(),
            next_id: AtomicU64::new(1),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn server() -> Self {
        Self::new(ExecutionContext::Server)
    }

    pub fn client() -> Self {
        Self::new(ExecutionContext::Client)
    }

    /// Toggle the identifier registry. Without it lookups go by path.
    pub fn set_id_registry(&self, available: bool) {
        self.id_registry.store(available, Ordering::Release);
    }

    pub fn register(&self, id: impl Into<String>, module: Arc<Module>) {
        self.by_id.insert(id.into(), Resident::Ready(module));
    }

    /// Register under a fresh numeric identifier and return it.
    pub fn register_anonymous(&self, module: Arc<Module>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.register(id.clone(), module);
        id
    }

    pub fn register_path(&self, path: impl Into<String>, module: Arc<Module>) {
        self.by_path.insert(path.into(), Resident::Ready(module));
    }

    /// Register an identifier whose lookup fails.
    pub fn register_broken(&self, id: impl Into<String>, reason: impl Into<String>) {
        self.by_id.insert(id.into(), Resident::Broken(reason.into()));
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.by_id.remove(id).is_some()
    }

    pub fn is_resident(&self, id: &str) -> bool {
        matches!(self.by_id.get(id).as_deref(), Some(Resident::Ready(_)))
    }

    /// Make a unit fetchable under `id` without making it resident.
    pub fn stage(&self, id: impl Into<String>, module: Arc<Module>) {
        self.staged.insert(id.into(), Staged { module, path: None });
    }

    /// Like [`stage`](Self::stage), also registering `path` once loaded.
    pub fn stage_with_path(
        &self,
        id: impl Into<String>,
        path: impl Into<String>,
        module: Arc<Module>,
    ) {
        self.staged.insert(
            id.into(),
            Staged {
                module,
                path: Some(path.into()),
            },
        );
    }

    /// Move a staged unit into the registries, as a finished chunk load would.
    pub fn load_staged(&self, id: &str) -> Option<Arc<Module>> {
        let (id, staged) = self.staged.remove(id)?;
        if let Some(path) = staged.path {
            self.register_path(path, staged.module.clone());
        }
        self.register(id.clone(), staged.module.clone());
        tracing::debug!(%id, "staged unit is now resident");
        Some(staged.module)
    }

    /// An acquisition that waits `latency`, then makes the staged unit
    /// resident and returns it.
    pub fn fetcher<P: 'static>(self: &Arc<Self>, id: impl Into<String>, latency: Duration) -> Acquisition<P> {
        let host = Arc::clone(self);
        let id = id.into();
        Acquisition::procedure(move |_props: &P| {
            let host = host.clone();
            let id = id.clone();
            host.fetches.fetch_add(1, Ordering::Relaxed);
            async move {
                tokio::time::sleep(latency).await;
                if let Some(module) = host.load_staged(&id) {
                    return Ok(module);
                }
                match host.by_id.get(&id).as_deref() {
                    Some(Resident::Ready(module)) => Ok(module.clone()),
                    _ => Err(AcquireError::msg(format!("chunk for '{id}' not found"))),
                }
            }
        })
    }

    /// How many acquisitions from [`fetcher`](Self::fetcher) have started.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn read(entry: Option<Resident>, id: &str) -> Result<Option<Arc<Module>>, HostError> {
        match entry {
            None => Ok(None),
            Some(Resident::Ready(module)) => Ok(Some(module)),
            Some(Resident::Broken(reason)) => Err(HostError::InitFailed {
                id: id.to_string(),
                reason,
            }),
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::server()
    }
}

impl ModuleHost for MemoryHost {
    fn is_server(&self) -> bool {
        self.context == ExecutionContext::Server
    }

    fn has_id_registry(&self) -> bool {
        self.id_registry.load(Ordering::Acquire)
    }

    fn require_by_id(&self, id: &str) -> Result<Option<Arc<Module>>, HostError> {
        if !self.has_id_registry() {
            return Err(HostError::RegistryUnavailable("identifier"));
        }
        Self::read(self.by_id.get(id).map(|entry| entry.clone()), id)
    }

    fn require_by_path(&self, path: &str) -> Result<Option<Arc<Module>>, HostError> {
        Self::read(self.by_path.get(path).map(|entry| entry.clone()), path)
    }
}
