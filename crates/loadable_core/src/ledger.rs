//! Usage ledger
//!
//! Records which chunk names and module identifiers were used during one
//! server response cycle, so a packaging step can embed them in the
//! response. Owned by the hosting context and drained after each render.

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Where the engine is running. Only the server records usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    #[default]
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    ChunkName,
    ModuleId,
}

/// Both ledger sets, drained together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushedUsage {
    pub chunk_names: Vec<String>,
    pub module_ids: Vec<String>,
}

impl FlushedUsage {
    pub fn is_empty(&self) -> bool {
        self.chunk_names.is_empty() && self.module_ids.is_empty()
    }
}

#[derive(Debug, Default)]
struct LedgerSets {
    chunk_names: IndexSet<String>,
    module_ids: IndexSet<String>,
}

impl LedgerSets {
    fn set_mut(&mut self, kind: UsageKind) -> &mut IndexSet<String> {
        match kind {
            UsageKind::ChunkName => &mut self.chunk_names,
            UsageKind::ModuleId => &mut self.module_ids,
        }
    }

    fn set(&self, kind: UsageKind) -> &IndexSet<String> {
        match kind {
            UsageKind::ChunkName => &self.chunk_names,
            UsageKind::ModuleId => &self.module_ids,
        }
    }
}

#[derive(Debug)]
pub struct UsageLedger {
    context: ExecutionContext,
    sets: Mutex<LedgerSets>,
}

impl UsageLedger {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            sets: Mutex::new(LedgerSets::default()),
        }
    }

    pub fn server() -> Self {
        Self::new(ExecutionContext::Server)
    }

    pub fn client() -> Self {
        Self::new(ExecutionContext::Client)
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Returns true if the value was newly added.
    pub fn record(&self, kind: UsageKind, value: impl Into<String>) -> bool {
        if self.context == ExecutionContext::Client {
            return false;
        }
        let value = value.into();
        let added = self.sets.lock().set_mut(kind).insert(value.clone());
        if added {
            tracing::trace!(?kind, %value, "recorded usage");
        }
        added
    }

    pub fn record_chunk_name(&self, name: impl Into<String>) -> bool {
        self.record(UsageKind::ChunkName, name)
    }

    pub fn record_module_id(&self, id: impl Into<String>) -> bool {
        self.record(UsageKind::ModuleId, id)
    }

    /// Entries recorded since the last drain, in insertion order. Leaves the
    /// set empty.
    pub fn drain(&self, kind: UsageKind) -> Vec<String> {
        std::mem::take(self.sets.lock().set_mut(kind))
            .into_iter()
            .collect()
    }

    pub fn drain_chunk_names(&self) -> Vec<String> {
        self.drain(UsageKind::ChunkName)
    }

    pub fn drain_module_ids(&self) -> Vec<String> {
        self.drain(UsageKind::ModuleId)
    }

    /// Drain both sets under one lock.
    pub fn flush(&self) -> FlushedUsage {
        let mut sets = self.sets.lock();
        let flushed = FlushedUsage {
            chunk_names: std::mem::take(&mut sets.chunk_names).into_iter().collect(),
            module_ids: std::mem::take(&mut sets.module_ids).into_iter().collect(),
        };
        tracing::debug!(
            chunks = flushed.chunk_names.len(),
            modules = flushed.module_ids.len(),
            "flushed usage ledger"
        );
        flushed
    }

    pub fn len(&self, kind: UsageKind) -> usize {
        self.sets.lock().set(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        let sets = self.sets.lock();
        sets.chunk_names.is_empty() && sets.module_ids.is_empty()
    }
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::server()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_insertion_order_then_empties() {
        let ledger = UsageLedger::server();
        ledger.record_chunk_name("es6");
        ledger.record_chunk_name("es5");

        assert_eq!(ledger.drain_chunk_names(), vec!["es6", "es5"]);
        assert!(ledger.drain_chunk_names().is_empty());
    }

    #[test]
    fn duplicate_records_are_ignored() {
        let ledger = UsageLedger::server();
        assert!(ledger.record_module_id("./Foo.js"));
        assert!(!ledger.record_module_id("./Foo.js"));
        assert_eq!(ledger.len(UsageKind::ModuleId), 1);
    }

    #[test]
    fn sets_are_independent() {
        let ledger = UsageLedger::server();
        ledger.record_chunk_name("home");
        ledger.record_module_id("42");

        assert_eq!(ledger.drain_module_ids(), vec!["42"]);
        assert_eq!(ledger.len(UsageKind::ChunkName), 1);
    }

    #[test]
    fn client_ledger_records_nothing() {
        let ledger = UsageLedger::client();
        assert!(!ledger.record_chunk_name("home"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn flush_drains_both_sets() {
        let ledger = UsageLedger::server();
        ledger.record_chunk_name("home");
        ledger.record_module_id("7");

        let flushed = ledger.flush();
        assert_eq!(flushed.chunk_names, vec!["home"]);
        assert_eq!(flushed.module_ids, vec!["7"]);
        assert!(ledger.is_empty());
        assert!(ledger.flush().is_empty());

        let json = serde_json::to_value(&flushed).unwrap();
        assert_eq!(json["chunk_names"][0], "home");
    }
}
