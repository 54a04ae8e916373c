//! Key-addressable blob storage
//!
//! Audio assets, chunk-upload staging objects, and best-effort backups
//! all live in one store addressed by string keys (`audio/<id>`,
//! `chunks/<session>/<n>`, `backup/<id>`). The filesystem implementation
//! roots keys under the service root folder. Uploaded bytes are
//! immutable: nothing in this service ever rewrites an existing asset.

use medscribe_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// SHA-256 hex digest of a byte buffer
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root/blobs`
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.join("blobs"),
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(Error::InvalidInput(format!("Invalid blob key: {}", key)));
        }
        Ok(self.root.join(key))
    }

    /// Write a blob; parent directories are created as needed
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key, size = bytes.len(), "Blob written");
        Ok(())
    }

    /// Read a blob's bytes
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Blob not found: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True when the blob exists and is readable
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// List keys under a prefix, sorted by key
    ///
    /// The sort order is the contract chunk reassembly depends on:
    /// chunk objects are named with zero-padded indices, so sorted key
    /// order is upload order.
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.resolve(prefix)?;
        let mut keys = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                let name = entry.file_name().to_string_lossy().to_string();
                keys.push(format!("{}/{}", prefix.trim_end_matches('/'), name));
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Delete a blob; deleting an absent key is not an error
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
