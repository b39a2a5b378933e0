//! File-backed store: one file per resource at `root/{Kind}/{ID}`.
//!
//! The key maps straight onto a path, so `get` and `delete` touch a single file. Each write goes
//! to its own dotfile in the same directory and is renamed into place, so readers never see a
//! torn value and concurrent writers of one key do not collide; the last rename wins. Dotfiles
//! are invisible to `list_by_kind`.

use super::{check_segment, resource_key, ResourceStore};
use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use ulid::Ulid;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, kind: &str, id: &str) -> Result<PathBuf, StoreError> {
        check_segment(kind)?;
        check_segment(id)?;
        Ok(self.root.join(kind).join(id))
    }

    fn kind_dir(&self, kind: &str) -> Result<PathBuf, StoreError> {
        check_segment(kind)?;
        Ok(self.root.join(kind))
    }
}

fn not_found(kind: &str, id: &str, e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound {
            key: resource_key(kind, id),
        }
    } else {
        StoreError::from(e)
    }
}

#[async_trait]
impl ResourceStore for FileStore {
    async fn put(&self, kind: &str, id: &str, value: Bytes) -> Result<(), StoreError> {
        let path = self.path_for(kind, id)?;
        let dir = self.kind_dir(kind)?;
        fs::create_dir_all(&dir).await?;

        let tmp = dir.join(format!(".{id}.{}.tmp", Ulid::new()));
        fs::write(&tmp, &value).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(kind, id, size = value.len(), "Put");
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(kind, id)?;
        fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| not_found(kind, id, e))
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(kind, id)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found(kind, id, e))?;
        debug!(kind, id, "Deleted");
        Ok(())
    }

    async fn list_by_kind(&self, kind: &str) -> Result<Vec<Bytes>, StoreError> {
        let dir = self.kind_dir(kind)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut values = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match fs::read(entry.path()).await {
                Ok(bytes) => values.push(Bytes::from(bytes)),
                // deleted between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(values)
    }

    async fn delete_by_kind(&self, kind: &str) -> Result<usize, StoreError> {
        let dir = self.kind_dir(kind)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => count += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        debug!(kind, count, "Deleted kind");
        Ok(count)
    }
}
