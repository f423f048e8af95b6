//! On-disk storage for uploaded media (images, voice notes, avatars).
//!
//! Blobs are addressed by a random UUID handle and fanned out over 256
//! sub-directories keyed by the handle's first byte:
//! `<base>/<hh>/<uuid>`. Messages and status posts refer to media by that
//! handle, or by a full URL ending in `/blob/<handle>`.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Extract the blob handle from a stored media reference: either a bare
/// UUID or a URL whose last path segment is one.
pub fn handle_from_reference(reference: &str) -> Option<Uuid> {
    let last = reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(reference);
    Uuid::parse_str(last).ok()
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    max_size: usize,
}

impl BlobStore {
    pub async fn new(root: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&root).await.map_err(|e| {
            ServerError::BlobStorage(format!("cannot create {}: {e}", root.display()))
        })?;

        info!(path = %root.display(), max_size, "Blob store ready");
        Ok(Self { root, max_size })
    }

    /// Persist `data` under a fresh handle.
    ///
    /// The bytes land in a `.part` file first and are renamed into place, so
    /// a reader never observes a half-written blob.
    pub async fn store_blob(&self, data: &[u8]) -> Result<Uuid, ServerError> {
        if data.is_empty() {
            return Err(ServerError::Validation("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::BlobTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let path = self.path_for(id);
        let shard = self.root.join(shard_of(id));
        let partial = path.with_extension("part");

        let write = async {
            fs::create_dir_all(&shard).await?;
            fs::write(&partial, data).await?;
            fs::rename(&partial, &path).await
        };
        if let Err(e) = write.await {
            let _ = fs::remove_file(&partial).await;
            return Err(ServerError::BlobStorage(format!("write {id}: {e}")));
        }

        debug!(id = %id, size = data.len(), "Stored blob");
        Ok(id)
    }

    pub async fn get_blob(&self, id: Uuid) -> Result<Vec<u8>, ServerError> {
        match fs::read(self.path_for(id)).await {
            Ok(data) => {
                debug!(id = %id, size = data.len(), "Read blob");
                Ok(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ServerError::BlobNotFound(id)),
            Err(e) => Err(ServerError::BlobStorage(format!("read {id}: {e}"))),
        }
    }

    pub async fn delete_blob(&self, id: Uuid) -> Result<(), ServerError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => {
                debug!(id = %id, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ServerError::BlobNotFound(id)),
            Err(e) => Err(ServerError::BlobStorage(format!("delete {id}: {e}"))),
        }
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(shard_of(id)).join(id.to_string())
    }
}

fn shard_of(id: Uuid) -> String {
    format!("{:02x}", id.as_bytes()[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"), 1024).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn store_then_read_back() {
        let (store, dir) = test_store().await;

        let id = store.store_blob(b"voice-note-bytes").await.unwrap();
        assert_eq!(store.get_blob(id).await.unwrap(), b"voice-note-bytes");

        let on_disk = dir.path().join("blobs").join(shard_of(id)).join(id.to_string());
        assert!(on_disk.exists());
        assert!(!on_disk.with_extension("part").exists());
    }

    #[tokio::test]
    async fn delete_is_not_repeatable() {
        let (store, _dir) = test_store().await;
        let id = store.store_blob(b"delete-me").await.unwrap();

        store.delete_blob(id).await.unwrap();
        assert!(matches!(store.get_blob(id).await, Err(ServerError::BlobNotFound(_))));
        assert!(matches!(store.delete_blob(id).await, Err(ServerError::BlobNotFound(_))));
    }

    #[tokio::test]
    async fn size_limits() {
        let (store, _dir) = test_store().await;
        assert!(matches!(store.store_blob(b"").await, Err(ServerError::Validation(_))));
        assert!(matches!(
            store.store_blob(&[0u8; 1025]).await,
            Err(ServerError::BlobTooLarge { size: 1025, max: 1024 })
        ));
        assert!(store.store_blob(&[7u8; 1024]).await.is_ok());
    }

    #[test]
    fn handles_are_found_in_urls() {
        let id = Uuid::new_v4();
        assert_eq!(handle_from_reference(&id.to_string()), Some(id));
        assert_eq!(
            handle_from_reference(&format!("http://localhost:8080/blob/{id}")),
            Some(id)
        );
        assert_eq!(handle_from_reference("https://cdn.example.com/cat.png"), None);
    }
}
