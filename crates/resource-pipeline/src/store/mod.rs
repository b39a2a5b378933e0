//! # Storage Contract
//!
//! Steps persist resources through the [`ResourceStore`] trait: a flat key-value contract keyed
//! by `"{Kind}/{ID}"`. Implementations must serve `get` and `delete` as direct key operations;
//! nothing here scans the key space except `list_by_kind`.
//!
//! There are no cross-call transactions. Two pipelines that load then persist the same key race,
//! and the last successful `put` wins.
//!
//! Implementations:
//! - [`MemoryStore`]: nested hash maps, for tests and ephemeral daemons.
//! - [`FileStore`]: one file per resource under `root/{Kind}/{ID}`.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::resource::ApiResource;
use async_trait::async_trait;
use bytes::Bytes;

/// Builds the storage key of a resource.
pub fn resource_key(kind: &str, id: &str) -> String {
    format!("{kind}/{id}")
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Writes `value` under `{kind}/{id}`, replacing any previous value.
    async fn put(&self, kind: &str, id: &str, value: Bytes) -> Result<(), StoreError>;

    async fn get(&self, kind: &str, id: &str) -> Result<Bytes, StoreError>;

    /// Removes `{kind}/{id}`. A missing key is `StoreError::NotFound`.
    async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError>;

    async fn list_by_kind(&self, kind: &str) -> Result<Vec<Bytes>, StoreError>;

    /// Removes every value of `kind`, returning how many were removed.
    async fn delete_by_kind(&self, kind: &str) -> Result<usize, StoreError>;
}

pub fn encode<R: ApiResource>(resource: &R) -> Result<Bytes, StoreError> {
    serde_json::to_vec(resource)
        .map(Bytes::from)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn decode<R: ApiResource>(bytes: &[u8]) -> Result<R, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decodes every resource of `kind`.
pub async fn list_resources<R: ApiResource>(
    store: &dyn ResourceStore,
    kind: &str,
) -> Result<Vec<R>, StoreError> {
    store
        .list_by_kind(kind)
        .await?
        .iter()
        .map(|b| decode(b))
        .collect()
}

pub(crate) fn check_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty()
        || segment.starts_with('.')
        || segment.contains(|c: char| c == '/' || c == '\\')
        || segment.contains("..")
    {
        return Err(StoreError::InvalidKey(format!("'{segment}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(resource_key("Agent", "agt-123"), "Agent/agt-123");
    }

    #[test]
    fn test_segment_rules() {
        assert!(check_segment("agt-123").is_ok());
        for bad in ["", ".hidden", "a/b", "a\\b", "x..y"] {
            assert!(check_segment(bad).is_err(), "{bad}");
        }
    }
}
