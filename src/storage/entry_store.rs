use crate::models::CapturedEntry;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

struct Ring {
    entries: VecDeque<Arc<CapturedEntry>>,
    next_sequence_id: u64,
}

/// Append-only log of captured entries in arrival order.
///
/// The write lock is the single point where sequence ids are assigned, so
/// the ring is always sorted by `sequence_id`. Readers only copy the index
/// of `Arc`s, never entry payloads.
pub struct EntryStore {
    ring: RwLock<Ring>,
    max_len: Option<usize>,
}

impl EntryStore {
    /// `max_len == 0` means unbounded.
    pub fn new(max_len: usize) -> Self {
        let max_len = (max_len > 0).then_some(max_len);
        Self {
            ring: RwLock::new(Ring {
                entries: VecDeque::with_capacity(max_len.unwrap_or(0).min(1024)),
                next_sequence_id: 1,
            }),
            max_len,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.max_len
    }

    /// Assign the next sequence id and make the entry visible to queries.
    /// Evicts the oldest entries when the capacity bound is exceeded.
    pub async fn append(&self, mut entry: CapturedEntry) -> u64 {
        let mut ring = self.ring.write().await;
        let sequence_id = ring.next_sequence_id;
        ring.next_sequence_id += 1;
        entry.sequence_id = sequence_id;
        ring.entries.push_back(Arc::new(entry));

        if let Some(max_len) = self.max_len {
            let mut evicted = 0usize;
            while ring.entries.len() > max_len {
                ring.entries.pop_front();
                evicted += 1;
            }
            if evicted > 0 {
                tracing::debug!("Evicted {} oldest entries (capacity {})", evicted, max_len);
            }
        }

        sequence_id
    }

    /// Point-in-time view of the store. Later appends, evictions and clears
    /// do not affect it.
    pub async fn snapshot(&self) -> Snapshot {
        let ring = self.ring.read().await;
        Snapshot {
            entries: ring.entries.iter().cloned().collect(),
        }
    }

    /// Remove every entry, returning how many were dropped. Sequence ids keep
    /// increasing across clears.
    pub async fn clear(&self) -> usize {
        let cleared = {
            let mut ring = self.ring.write().await;
            let count = ring.entries.len();
            ring.entries.clear();
            count
        };
        tracing::info!("Cleared {} entries from store", cleared);
        cleared
    }

    pub async fn len(&self) -> usize {
        self.ring.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ring.read().await.entries.is_empty()
    }

    /// Sequence id of the newest entry ever appended, if any.
    pub async fn last_sequence_id(&self) -> Option<u64> {
        let ring = self.ring.read().await;
        (ring.next_sequence_id > 1).then(|| ring.next_sequence_id - 1)
    }
}

/// Immutable, ordered view over entries taken by [`EntryStore::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<Arc<CapturedEntry>>,
}

impl Snapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<CapturedEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Arc<CapturedEntry>> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<CapturedEntry>;
    type IntoIter = std::slice::Iter<'a, Arc<CapturedEntry>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
