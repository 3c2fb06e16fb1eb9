//! Per-index client-handle cache.
//!
//! Entries are created lazily on first use, replaced when the index is
//! described, and dropped when the index is created or deleted through the
//! owning adapter.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::DocumentClient;
use crate::types::Metric;

/// A resolved client for one index, with the schema it was resolved against.
#[derive(Clone)]
pub struct IndexHandle {
    pub client: Arc<dyn DocumentClient>,
    pub dimension: usize,
    pub metric: Metric,
}

impl fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("index", &self.client.index_name())
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .finish()
    }
}

/// Map from index name to resolved handle, safe for concurrent use.
#[derive(Default)]
pub struct HandleCache {
    entries: RwLock<HashMap<String, IndexHandle>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<IndexHandle> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Insert a handle, keeping an entry another caller inserted first.
    pub fn insert(&self, name: &str, handle: IndexHandle) -> IndexHandle {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(handle)
            .clone()
    }

    /// Insert a handle, overwriting any existing entry.
    pub fn replace(&self, name: &str, handle: IndexHandle) -> IndexHandle {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), handle.clone());
        handle
    }

    /// Drop the entry for `name`. Returns whether one existed.
    pub fn invalidate(&self, name: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
