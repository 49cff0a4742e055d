//! In-memory metadata store with snapshot reads and atomic commits.
//!
//! The committed map sits behind an `RwLock<Arc<..>>`: a transaction clones
//! the `Arc` when it opens and reads that snapshot for its whole lifetime.
//! Writes are staged per transaction and applied in one step on commit.
//! A commit fails with [`StoreError::Conflict`] if any key it writes was
//! committed by another transaction after its snapshot was taken.

use crate::domain::error::StoreError;
use crate::ports::outbound::{MetaStore, ScanResult, Transaction};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    /// `None` is a tombstone, kept so deletes take part in conflict checks.
    value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
struct Committed {
    version: u64,
    entries: BTreeMap<Vec<u8>, Entry>,
}

#[derive(Default)]
struct StoreInner {
    committed: RwLock<Arc<Committed>>,
    closed: AtomicBool,
    next_tx_id: AtomicU64,
}

/// Metadata store kept entirely in memory.
///
/// Cheap to clone; clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryMetaStore {
    inner: Arc<StoreInner>,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a committed value outside any transaction
    pub fn get_committed(&self, key: &[u8]) -> Option<Vec<u8>> {
        let committed = self.inner.committed.read();
        committed.entries.get(key).and_then(|e| e.value.clone())
    }

    /// Number of live committed keys
    pub fn len(&self) -> usize {
        let committed = self.inner.committed.read();
        committed
            .entries
            .values()
            .filter(|e| e.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version of the latest commit
    pub fn version(&self) -> u64 {
        self.inner.committed.read().version
    }
}

impl MetaStore for InMemoryMetaStore {
    fn create_transaction(&self) -> Result<Arc<dyn Transaction>, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        let snapshot = Arc::clone(&self.inner.committed.read());
        let id = self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed);
        debug!(tx_id = id, snapshot_version = snapshot.version, "Transaction opened");

        Ok(Arc::new(MemoryTransaction {
            id,
            store: Arc::clone(&self.inner),
            snapshot,
            state: Mutex::new(TxState::default()),
        }))
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct TxState {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    finished: bool,
}

impl TxState {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished {
            Err(StoreError::TransactionFinished)
        } else {
            Ok(())
        }
    }
}

/// A transaction over [`InMemoryMetaStore`]
pub struct MemoryTransaction {
    id: u64,
    store: Arc<StoreInner>,
    snapshot: Arc<Committed>,
    state: Mutex<TxState>,
}

impl Transaction for MemoryTransaction {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.state.lock();
        state.ensure_open()?;

        if let Some(staged) = state.writes.get(key) {
            return Ok(staged.clone());
        }
        Ok(self
            .snapshot
            .entries
            .get(key)
            .and_then(|e| e.value.clone()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        let state = self.state.lock();
        state.ensure_open()?;

        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = self
            .snapshot
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect();

        for (k, v) in state
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            merged.insert(k.clone(), v.clone());
        }

        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        if self.store.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }

        if state.writes.is_empty() {
            state.finished = true;
            return Ok(());
        }

        let mut committed = self.store.committed.write();

        // Validate everything before touching the map: all or nothing.
        for key in state.writes.keys() {
            if let Some(entry) = committed.entries.get(key) {
                if entry.version > self.snapshot.version {
                    return Err(StoreError::Conflict {
                        key: String::from_utf8_lossy(key).into_owned(),
                    });
                }
            }
        }

        let target = Arc::make_mut(&mut committed);
        target.version += 1;
        let version = target.version;
        for (key, value) in std::mem::take(&mut state.writes) {
            target.entries.insert(key, Entry { version, value });
        }
        state.finished = true;

        debug!(tx_id = self.id, version, "Transaction committed");
        Ok(())
    }

    fn rollback(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.writes.clear();
        state.finished = true;

        debug!(tx_id = self.id, "Transaction rolled back");
        Ok(())
    }
}
