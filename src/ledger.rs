//! Ledger State Access
//!
//! The transfer core talks to the ledger through [`StateStore`] only: get,
//! put and delete by key.
//!
//! [`MemoryLedger`] is the in-process ledger used by the binary and the tests.
//! Each invocation runs against a [`LedgerTx`] which:
//! - records the version of every key it reads (read-set)
//! - stages every write until commit (write-set)
//!
//! Commit is optimistic: if any key in the read-set changed since it was read,
//! the whole transaction is rejected with [`LedgerError::Conflict`] and nothing
//! is applied. Two invocations that read-then-write the same slot can therefore
//! never both commit. Invocations on different keys never conflict.

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Read/write conflict on key {0}")]
    Conflict(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Narrow key/value interface the transfer core depends on.
pub trait StateStore {
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    fn del_state(&mut self, key: &str) -> Result<(), LedgerError>;
}

/// Committed value plus its version.
///
/// Deleted keys keep a tombstone (`value == None`) so the version keeps
/// increasing and a reader of the old value still conflicts.
#[derive(Debug, Clone)]
struct VersionedValue {
    version: u64,
    value: Option<Vec<u8>>,
}

/// In-memory versioned ledger
pub struct MemoryLedger {
    state: DashMap<String, VersionedValue>,
    /// Serialises validate-and-apply of commits
    commit_lock: Mutex<()>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: DashMap::new(),
            commit_lock: Mutex::new(()),
        }
    }

    /// Start a new invocation transaction
    pub fn begin(&self) -> LedgerTx<'_> {
        LedgerTx {
            ledger: self,
            reads: FxHashMap::default(),
            writes: FxHashMap::default(),
        }
    }

    /// Read a committed value outside of any transaction
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.state.get(key).and_then(|entry| entry.value.clone())
    }

    /// Committed version of a key (0 if never written)
    pub fn version(&self, key: &str) -> u64 {
        self.state.get(key).map(|entry| entry.version).unwrap_or(0)
    }

    /// Number of live (non-deleted) keys
    pub fn len(&self) -> usize {
        self.state
            .iter()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, key: &str) -> (u64, Option<Vec<u8>>) {
        match self.state.get(key) {
            Some(entry) => (entry.version, entry.value.clone()),
            None => (0, None),
        }
    }

    fn commit(
        &self,
        reads: FxHashMap<String, u64>,
        writes: FxHashMap<String, Option<Vec<u8>>>,
    ) -> Result<usize, LedgerError> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| LedgerError::Unavailable("commit lock poisoned".to_string()))?;

        for (key, seen) in &reads {
            if self.version(key) != *seen {
                debug!(key = %key, seen = seen, "Commit rejected: stale read");
                return Err(LedgerError::Conflict(key.clone()));
            }
        }

        let applied = writes.len();
        for (key, value) in writes {
            self.state
                .entry(key)
                .and_modify(|entry| {
                    entry.version += 1;
                    entry.value = value.clone();
                })
                .or_insert(VersionedValue { version: 1, value });
        }

        Ok(applied)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// One invocation's view of the ledger.
///
/// Reads see this transaction's own staged writes first. Dropping the
/// transaction without calling [`LedgerTx::commit`] discards every write.
pub struct LedgerTx<'a> {
    ledger: &'a MemoryLedger,
    reads: FxHashMap<String, u64>,
    writes: FxHashMap<String, Option<Vec<u8>>>,
}

impl LedgerTx<'_> {
    /// Validate the read-set and apply the write-set atomically.
    ///
    /// Returns the number of keys written.
    pub fn commit(self) -> Result<usize, LedgerError> {
        if self.writes.is_empty() {
            return Ok(0);
        }
        self.ledger.commit(self.reads, self.writes)
    }

    /// Number of staged writes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }
}

impl StateStore for LedgerTx<'_> {
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(staged.clone());
        }
        let (version, value) = self.ledger.read(key);
        self.reads.entry(key.to_string()).or_insert(version);
        Ok(value)
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn del_state(&mut self, key: &str) -> Result<(), LedgerError> {
        self.writes.insert(key.to_string(), None);
        Ok(())
    }
}
