//! Entry storage and HAR encoding

mod entry_store;
pub mod har;

pub use entry_store::{EntryStore, Snapshot};

use crate::error::QueryError;
use std::sync::{Arc, RwLock};

/// Default ring size when no capacity is configured
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Lifecycle slot for the process's entry store.
///
/// Cloning the handle shares the slot. The store exists between [`init`] and
/// [`teardown`]; lookups outside that window fail with
/// [`QueryError::StoreUnavailable`].
///
/// [`init`]: StoreHandle::init
/// [`teardown`]: StoreHandle::teardown
#[derive(Clone, Default)]
pub struct StoreHandle {
    slot: Arc<RwLock<Option<Arc<EntryStore>>>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that already holds `store`
    pub fn with_store(store: Arc<EntryStore>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(store))),
        }
    }

    /// Initialize the store if not already present and return it
    pub fn init(&self, max_entries: usize) -> anyhow::Result<Arc<EntryStore>> {
        let mut guard = self
            .slot
            .write()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
        if let Some(store) = guard.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(EntryStore::new(max_entries));
        *guard = Some(Arc::clone(&store));
        tracing::info!(
            "Entry store initialized (capacity: {})",
            store
                .capacity()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unbounded".to_string())
        );
        Ok(store)
    }

    /// Detach the store. Queries already holding it finish normally.
    pub fn teardown(&self) -> Option<Arc<EntryStore>> {
        let taken = match self.slot.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            tracing::info!("Entry store torn down");
        }
        taken
    }

    pub fn get(&self) -> Result<Arc<EntryStore>, QueryError> {
        let guard = self
            .slot
            .read()
            .map_err(|_| QueryError::StoreUnavailable)?;
        guard.clone().ok_or(QueryError::StoreUnavailable)
    }

    pub fn is_initialized(&self) -> bool {
        self.get().is_ok()
    }
}
