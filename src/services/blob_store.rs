//! Blob store clients.
//!
//! `BlobStore` is the seam the orchestrator writes image payloads through.
//! Two backends are provided:
//! - `FsBlobStore` keeps payloads on local disk, sharded beneath
//!   `base_path/{shard}/{shard}/{key}` with a JSON metadata sidecar.
//! - `MemoryBlobStore` keeps everything in a concurrent map (development and
//!   tests).

use crate::models::attachment::{BlobMeta, StorageKey};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{StreamExt, stream::BoxStream};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 1024;
const META_SUFFIX: &str = ".meta.json";
const TMP_MARKER: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error("blob key `{key}` rejected: {reason}")]
    Rejected { key: String, reason: &'static str },
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("metadata for blob `{key}` is unreadable: {source}")]
    CorruptMeta {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobStoreError>;

/// A stored payload opened for reading.
pub struct BlobDownload {
    pub meta: BlobMeta,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`. Single attempt; callers own any retry policy.
    async fn put(&self, key: &StorageKey, bytes: Bytes, content_type: &str)
    -> BlobResult<BlobMeta>;

    /// Open a stored payload for streaming.
    async fn get(&self, key: &StorageKey) -> BlobResult<BlobDownload>;

    /// Remove a payload. Returns `false` when nothing was stored under `key`.
    async fn delete(&self, key: &StorageKey) -> BlobResult<bool>;

    async fn health_check(&self) -> BlobResult<()>;
}

/// Reject keys that could escape the store root or break the on-disk layout.
fn ensure_key_safe(key: &str) -> BlobResult<()> {
    let reject = |reason| {
        Err(BlobStoreError::Rejected {
            key: key.to_string(),
            reason,
        })
    };
    if key.is_empty() {
        return reject("empty key");
    }
    if key.len() > MAX_KEY_LEN {
        return reject("key too long");
    }
    if key.starts_with('/') || key.contains("..") || key.contains('/') {
        return reject("key must be a single path segment");
    }
    if key.starts_with('.') {
        return reject("key must not start with a dot");
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return reject("key contains control characters");
    }
    Ok(())
}

/// Local-disk blob store.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `base_path`.
    pub async fn new(base_path: impl Into<PathBuf>) -> BlobResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    /// Two-level shard directories from MD5(key), keeping directory sizes
    /// bounded.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        self.base_path.join(shard_a).join(shard_b).join(key)
    }

    fn meta_path(object_path: &Path) -> PathBuf {
        let mut name = object_path.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    /// Temp files are named `.{target}.tmp-{uuid}` so a later delete of the
    /// key can find the ones an interrupted write left behind.
    fn tmp_prefix(file_name: &str) -> String {
        format!(".{file_name}{TMP_MARKER}")
    }

    /// Write `bytes` to a temp file beside `target`, fsync, then rename over it.
    async fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
        let (parent, file_name) = match (target.parent(), target.file_name()) {
            (Some(parent), Some(file_name)) => (parent, file_name.to_string_lossy()),
            _ => {
                return Err(io::Error::new(
                    ErrorKind::Other,
                    "object path missing parent directory",
                ));
            }
        };
        let tmp_path = parent.join(format!("{}{}", Self::tmp_prefix(&file_name), Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, target).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }

    async fn read_meta(&self, key: &StorageKey, object_path: &Path) -> BlobResult<BlobMeta> {
        let raw = fs::read(Self::meta_path(object_path))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => BlobStoreError::NotFound(key.to_string()),
                _ => BlobStoreError::Io(err),
            })?;
        serde_json::from_slice(&raw).map_err(|source| BlobStoreError::CorruptMeta {
            key: key.to_string(),
            source,
        })
    }

    /// Remove temp files left in `dir` by interrupted writes of `key` or its
    /// metadata sidecar.
    async fn sweep_stale_temps(dir: &Path, key: &str) -> io::Result<()> {
        let prefixes = [
            Self::tmp_prefix(key),
            Self::tmp_prefix(&format!("{key}{META_SUFFIX}")),
        ];
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
                match fs::remove_file(entry.path()).await {
                    Ok(_) => debug!(key, "removed stale temp file {}", name),
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Remove empty shard directories walking up from `start`, stopping at
    /// the store root or the first non-empty directory.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Bytes,
        content_type: &str,
    ) -> BlobResult<BlobMeta> {
        ensure_key_safe(key.as_str())?;

        let object_path = self.object_path(key.as_str());
        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        Self::write_atomic(&object_path, &bytes).await?;

        let meta = BlobMeta::for_payload(key.clone(), content_type, &bytes);
        let encoded = serde_json::to_vec(&meta).map_err(|source| BlobStoreError::CorruptMeta {
            key: key.to_string(),
            source,
        })?;
        if let Err(err) = Self::write_atomic(&Self::meta_path(&object_path), &encoded).await {
            let _ = fs::remove_file(&object_path).await;
            return Err(BlobStoreError::Io(err));
        }

        debug!(key = %key, size = meta.size_bytes, "stored blob {}", object_path.display());
        Ok(meta)
    }

    async fn get(&self, key: &StorageKey) -> BlobResult<BlobDownload> {
        ensure_key_safe(key.as_str())?;
        let object_path = self.object_path(key.as_str());
        let meta = self.read_meta(key, &object_path).await?;

        let file = File::open(&object_path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => BlobStoreError::NotFound(key.to_string()),
            _ => BlobStoreError::Io(err),
        })?;

        Ok(BlobDownload {
            meta,
            body: ReaderStream::new(file).boxed(),
        })
    }

    async fn delete(&self, key: &StorageKey) -> BlobResult<bool> {
        ensure_key_safe(key.as_str())?;
        let object_path = self.object_path(key.as_str());

        // an interrupted put can leave the object without its sidecar
        let removed = match fs::remove_file(&object_path).await {
            Ok(_) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => return Err(BlobStoreError::Io(err)),
        };
        match fs::remove_file(Self::meta_path(&object_path)).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(BlobStoreError::Io(err)),
        }

        if let Some(parent) = object_path.parent() {
            Self::sweep_stale_temps(parent, key.as_str()).await?;
            self.prune_empty_dirs(parent).await;
        }
        Ok(removed)
    }

    /// Best-effort write/read/delete of a probe file under the store root.
    async fn health_check(&self) -> BlobResult<()> {
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;

        if read_back? != b"readyz" {
            return Err(BlobStoreError::Unavailable("probe file content mismatch".into()));
        }
        Ok(())
    }
}

/// In-process blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<StorageKey, (BlobMeta, Bytes)>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.blobs.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Bytes,
        content_type: &str,
    ) -> BlobResult<BlobMeta> {
        ensure_key_safe(key.as_str())?;
        let meta = BlobMeta::for_payload(key.clone(), content_type, &bytes);
        self.blobs.insert(key.clone(), (meta.clone(), bytes));
        Ok(meta)
    }

    async fn get(&self, key: &StorageKey) -> BlobResult<BlobDownload> {
        let (meta, bytes) = self
            .blobs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobStoreError::NotFound(key.to_string()))?;
        Ok(BlobDownload {
            meta,
            body: futures::stream::once(async move { Ok::<_, io::Error>(bytes) }).boxed(),
        })
    }

    async fn delete(&self, key: &StorageKey) -> BlobResult<bool> {
        Ok(self.blobs.remove(key).is_some())
    }

    async fn health_check(&self) -> BlobResult<()> {
        Ok(())
    }
}
