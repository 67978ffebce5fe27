//! Loadable Core
//!
//! Dual-mode unit resolution:
//! - Eager lookup of units already resident in the host's module registry
//! - Deferred acquisition with a timeout and single-flight coalescing
//! - Export selection with the default-export convention
//! - A usage ledger drained once per server response cycle
//!
//! ```ignore
//! let context = HostContext::new(host, Arc::new(UsageLedger::server()));
//! let page = Loadable::new(
//!     Acquisition::procedure(|_| fetch_chunk("home")),
//!     LoadableOptions::new().id("./pages/Home.js").chunk_name("home"),
//!     &context,
//!     &(),
//! );
//! let value = match page.require_sync(&()) {
//!     Some(value) => value,
//!     None => page.require_async(&()).await?,
//! };
//! page.record_usage(&());
//! let manifest = context.ledger.flush();
//! ```

pub mod acquire;
pub mod config;
mod deferred;
mod eager;
pub mod error;
pub mod host;
pub mod ledger;
mod loadable;
pub mod metrics;
pub mod options;
pub mod selector;
pub mod unit;

pub use acquire::{AcquireError, AcquireResult, Acquisition, Completion};
pub use config::{LedgerSettings, LoaderSettings, Settings, SettingsError, DEFAULT_TIMEOUT_MS};
pub use deferred::LoadState;
pub use error::{HostError, LoadError};
pub use host::{HostContext, LoadContext, ModuleHost, Source};
pub use ledger::{ExecutionContext, FlushedUsage, UsageKind, UsageLedger};
pub use loadable::Loadable;
pub use metrics::LoaderMetrics;
pub use options::{ErrorHook, LoadHook, LoadableOptions};
pub use selector::{select_export, ExportSelector};
pub use unit::{downcast_export, export, Export, Module, DEFAULT_EXPORT};

pub use loadable_metrics::LoadEvent;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
