//! Eager (synchronous) resolution
//!
//! Looks a unit up in whatever the host already has in memory. A miss is
//! expected while the host is still loading, so every failure here is
//! swallowed and reported as "not yet available".

use crate::host::Locator;
use crate::metrics::LoaderMetrics;
use crate::options::LoadHook;
use crate::selector::{select_export, ExportSelector};
use crate::unit::Export;
use loadable_metrics::LoadEvent;
use std::sync::Arc;

/// A successful eager lookup.
#[derive(Clone)]
pub struct EagerHit {
    pub value: Export,
    /// The identifier (or path) the unit was found under.
    pub module_id: String,
}

pub(crate) struct EagerResolver {
    pub selector: ExportSelector,
    pub on_load: Option<LoadHook>,
    pub metrics: Option<Arc<LoaderMetrics>>,
}

impl EagerResolver {
    pub fn resolve<P>(&self, locator: &Locator<P>, props: &P) -> Option<EagerHit> {
        let hit = self.lookup(locator, props);
        if let Some(metrics) = &self.metrics {
            metrics.record(if hit.is_some() {
                LoadEvent::EagerHit
            } else {
                LoadEvent::EagerMiss
            });
        }
        hit
    }

    fn lookup<P>(&self, locator: &Locator<P>, props: &P) -> Option<EagerHit> {
        let (module, module_id) = match locator.lookup(props) {
            Ok(Some(found)) => found,
            Ok(None) => {
                tracing::trace!("unit not resident yet");
                return None;
            }
            Err(err) => {
                tracing::debug!(%err, "eager lookup failed, treating unit as not yet available");
                return None;
            }
        };

        if let Some(hook) = &self.on_load {
            hook(&module, locator.context(true));
        }

        let Some(value) = select_export(&module, &self.selector) else {
            tracing::debug!(%module_id, selector = %self.selector, "resident unit lacks selected export");
            return None;
        };

        tracing::debug!(%module_id, "resolved unit eagerly");
        Some(EagerHit { value, module_id })
    }
}
