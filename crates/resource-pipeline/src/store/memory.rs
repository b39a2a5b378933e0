//! In-memory store.

use super::{check_segment, resource_key, ResourceStore};
use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Kind-partitioned hash maps; `get` and `delete` are single lookups.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kinds: RwLock<HashMap<String, HashMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.kinds
            .read()
            .map(|kinds| kinds.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn put(&self, kind: &str, id: &str, value: Bytes) -> Result<(), StoreError> {
        check_segment(kind)?;
        check_segment(id)?;
        let mut kinds = self
            .kinds
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        kinds
            .entry(kind.to_string())
            .or_default()
            .insert(id.to_string(), value);
        debug!(kind, id, "Put");
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Bytes, StoreError> {
        let kinds = self
            .kinds
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        kinds
            .get(kind)
            .and_then(|ids| ids.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: resource_key(kind, id),
            })
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        let mut kinds = self
            .kinds
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let removed = kinds.get_mut(kind).and_then(|ids| ids.remove(id));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                key: resource_key(kind, id),
            });
        }
        if kinds.get(kind).is_some_and(HashMap::is_empty) {
            kinds.remove(kind);
        }
        debug!(kind, id, "Deleted");
        Ok(())
    }

    async fn list_by_kind(&self, kind: &str) -> Result<Vec<Bytes>, StoreError> {
        let kinds = self
            .kinds
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(kinds
            .get(kind)
            .map(|ids| ids.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_by_kind(&self, kind: &str) -> Result<usize, StoreError> {
        let mut kinds = self
            .kinds
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let count = kinds.remove(kind).map(|ids| ids.len()).unwrap_or(0);
        debug!(kind, count, "Deleted kind");
        Ok(count)
    }
}
