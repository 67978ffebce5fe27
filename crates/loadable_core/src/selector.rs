//! Export selection
//!
//! Picks the part of a loaded [`Module`] that a caller asked for.

use crate::unit::{Export, Module};
use std::fmt;
use std::sync::Arc;

pub type ExportFn = Arc<dyn Fn(&Arc<Module>) -> Option<Export> + Send + Sync>;

/// Which part of a unit to hand back.
#[derive(Clone, Default)]
pub enum ExportSelector {
    /// The default member for units using the default-export convention,
    /// otherwise the unit itself.
    #[default]
    Default,
    /// A named member. Absent members select nothing.
    Named(String),
    /// The unit itself, unchanged.
    Whole,
    /// A caller-supplied extraction.
    Map(ExportFn),
}

impl ExportSelector {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn map<F>(f: F) -> Self
    where
        F: Fn(&Arc<Module>) -> Option<Export> + Send + Sync + 'static,
    {
        Self::Map(Arc::new(f))
    }
}

impl From<&str> for ExportSelector {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for ExportSelector {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Debug for ExportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Whole => f.write_str("Whole"),
            Self::Map(_) => f.write_str("Map(<fn>)"),
        }
    }
}

impl fmt::Display for ExportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default export"),
            Self::Named(name) => write!(f, "export '{name}'"),
            Self::Whole => f.write_str("whole unit"),
            Self::Map(_) => f.write_str("mapped export"),
        }
    }
}

/// Extract the selected value from `module`.
pub fn select_export(module: &Arc<Module>, selector: &ExportSelector) -> Option<Export> {
    match selector {
        ExportSelector::Map(f) => f(module),
        ExportSelector::Whole => Some(module.clone() as Export),
        ExportSelector::Named(name) => module.get(name),
        ExportSelector::Default if module.uses_default_export() => module.default_export(),
        ExportSelector::Default => Some(module.clone() as Export),
    }
}
