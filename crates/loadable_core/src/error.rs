use crate::acquire::AcquireError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a deferred resolution failed.
///
/// Cloneable so one failed attempt can be reported to every caller that
/// joined it.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("timeout exceeded after {}ms", timeout.as_millis())]
    TimeoutExceeded { timeout: Duration },

    #[error("{selector} not found in loaded unit")]
    ExportNotFound { selector: String },

    #[error("acquisition failed: {0}")]
    AcquisitionFailed(#[source] Arc<AcquireError>),
}

impl LoadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LoadError::TimeoutExceeded { .. })
    }

    pub fn is_export_not_found(&self) -> bool {
        matches!(self, LoadError::ExportNotFound { .. })
    }
}

impl From<AcquireError> for LoadError {
    fn from(err: AcquireError) -> Self {
        LoadError::AcquisitionFailed(Arc::new(err))
    }
}

/// Errors raised by a host while looking up a resident unit.
///
/// The eager path absorbs these; they never reach callers.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("module '{id}' failed to initialize: {reason}")]
    InitFailed { id: String, reason: String },

    #[error("host has no {0} registry")]
    RegistryUnavailable(&'static str),
}
