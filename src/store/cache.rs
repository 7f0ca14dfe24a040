//! In-memory table cache.
//!
//! The store only talks to the [`TableCache`] trait; [`LruTableCache`] is the default
//! implementation. A cache may forget an entry at any time: the durable files are the source of
//! truth and a miss falls back to them.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::cleaning::CleanedTable;

use super::TableId;

/// Cache of loaded tables keyed by identifier.
pub trait TableCache: Send + Sync {
    /// Look up a table, marking it as recently used.
    fn get(&self, id: &TableId) -> Option<Arc<CleanedTable>>;

    /// Insert (or refresh) a table. Returns the identifier evicted to make room, if any.
    fn insert(&self, id: TableId, table: Arc<CleanedTable>) -> Option<TableId>;

    /// Drop a table from the cache.
    fn remove(&self, id: &TableId) -> Option<Arc<CleanedTable>>;

    /// Number of cached tables.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LruState {
    entries: HashMap<TableId, Arc<CleanedTable>>,
    /// Most recently used at the front, least recently used at the back.
    order: VecDeque<TableId>,
    capacity: usize,
}

impl LruState {
    fn touch(&mut self, id: &TableId) {
        self.order.retain(|k| k != id);
        self.order.push_front(*id);
    }
}

/// Count-bounded cache with least-recently-used eviction.
///
/// The lock only guards the map and the access order; table values are shared `Arc`s, so a
/// reader never holds the lock while it uses a table.
pub struct LruTableCache {
    state: Mutex<LruState>,
}

impl LruTableCache {
    /// Create a cache holding at most `capacity` tables (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(LruState {
                entries: HashMap::new(),
                order: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().map(|s| s.capacity).unwrap_or(0)
    }
}

impl fmt::Debug for LruTableCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruTableCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

// A poisoned lock behaves like an empty cache; reads fall back to durable storage.
impl TableCache for LruTableCache {
    fn get(&self, id: &TableId) -> Option<Arc<CleanedTable>> {
        let mut state = self.state.lock().ok()?;
        let table = state.entries.get(id).cloned()?;
        state.touch(id);
        Some(table)
    }

    fn insert(&self, id: TableId, table: Arc<CleanedTable>) -> Option<TableId> {
        let mut state = self.state.lock().ok()?;
        let mut evicted = None;
        if !state.entries.contains_key(&id) && state.entries.len() >= state.capacity {
            if let Some(lru) = state.order.pop_back() {
                state.entries.remove(&lru);
                evicted = Some(lru);
            }
        }
        state.touch(&id);
        state.entries.insert(id, table);
        evicted
    }

    fn remove(&self, id: &TableId) -> Option<Arc<CleanedTable>> {
        let mut state = self.state.lock().ok()?;
        state.order.retain(|k| k != id);
        state.entries.remove(id)
    }

    fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }
}
