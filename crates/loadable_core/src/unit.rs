//! Loaded units and their exports

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Member name used by the default-export convention.
pub const DEFAULT_EXPORT: &str = "default";

/// A value handed out by a unit. Callers downcast to the concrete type.
pub type Export = Arc<dyn Any + Send + Sync>;

/// Wrap a value as an [`Export`].
pub fn export<T: Any + Send + Sync>(value: T) -> Export {
    Arc::new(value)
}

/// Downcast an [`Export`] to a concrete type.
pub fn downcast_export<T: Any + Send + Sync>(export: &Export) -> Option<Arc<T>> {
    export.clone().downcast::<T>().ok()
}

/// An opaque loaded unit: named members plus an optional default member.
#[derive(Clone, Default)]
pub struct Module {
    exports: HashMap<String, Export>,
    es_module: bool,
}

impl Module {
    /// A unit that does not follow the default-export convention.
    pub fn new() -> Self {
        Self::default()
    }

    /// A unit that marks itself as using the default-export convention.
    pub fn es_module() -> Self {
        Self {
            exports: HashMap::new(),
            es_module: true,
        }
    }

    pub fn with_export<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.exports.insert(name.into(), export(value));
        self
    }

    pub fn with_default<T: Any + Send + Sync>(self, value: T) -> Self {
        self.with_export(DEFAULT_EXPORT, value)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Export) -> Option<Export> {
        self.exports.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<Export> {
        self.exports.get(name).cloned()
    }

    pub fn default_export(&self) -> Option<Export> {
        self.get(DEFAULT_EXPORT)
    }

    pub fn uses_default_export(&self) -> bool {
        self.es_module
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    pub fn into_shared(self) -> Arc<Module> {
        Arc::new(self)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.export_names().collect();
        names.sort_unstable();
        f.debug_struct("Module")
            .field("es_module", &self.es_module)
            .field("exports", &names)
            .finish()
    }
}
