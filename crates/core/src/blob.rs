//! Opaque blob references and the local-directory blob store.
//!
//! A [`BlobRef`] is a `/`-separated path relative to the store root. It is
//! what gets persisted; the public URL is derived on demand.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::CoreError;

/// URL prefix under which blobs are served.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Maximum length of a sanitized filename component.
const MAX_FILENAME_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    /// Wrap an already-stored relative path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stores blobs as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to `<prefix>/<filename>` and return its reference.
    pub async fn put(&self, prefix: &str, filename: &str, bytes: &[u8]) -> Result<BlobRef, CoreError> {
        let (blob, path) = self.prepare(prefix, filename).await?;
        fs::write(&path, bytes)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to write {}: {e}", path.display())))?;
        Ok(blob)
    }

    /// Copy an existing file into the store without buffering it in memory.
    pub async fn put_file(&self, prefix: &str, source: &Path) -> Result<BlobRef, CoreError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output");
        let (blob, path) = self.prepare(prefix, filename).await?;
        fs::copy(source, &path).await.map_err(|e| {
            CoreError::Internal(format!(
                "Failed to copy {} to {}: {e}",
                source.display(),
                path.display()
            ))
        })?;
        Ok(blob)
    }

    /// Remove a stored blob. A blob that is already gone is not an error.
    pub async fn delete(&self, blob: &BlobRef) -> Result<(), CoreError> {
        match fs::remove_file(self.path(blob)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Internal(format!("Failed to delete {}: {e}", blob.0))),
        }
    }

    /// Resolve `<prefix>/<filename>` and create its parent directory.
    async fn prepare(&self, prefix: &str, filename: &str) -> Result<(BlobRef, PathBuf), CoreError> {
        let relative = format!("{}/{}", prefix.trim_matches('/'), sanitize_filename(filename));
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Internal(format!("Failed to create {}: {e}", parent.display())))?;
        }
        Ok((BlobRef(relative), path))
    }

    /// Filesystem location of a stored blob.
    pub fn path(&self, blob: &BlobRef) -> PathBuf {
        self.root.join(&blob.0)
    }

    /// Public retrieval URL of a stored blob.
    pub fn url(&self, blob: &BlobRef) -> String {
        format!("{}{MEDIA_URL_PREFIX}/{}", self.public_base_url, blob.0)
    }
}

/// Reduce a client-supplied filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "blob".to_string()
    } else {
        cleaned.to_string()
    }
}
