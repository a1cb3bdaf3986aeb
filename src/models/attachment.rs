//! Upload payloads and the blob-store artifacts they become.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An uploaded image as received from the form layer.
///
/// Lives only for the duration of one create request.
#[derive(Clone, Debug)]
pub struct Attachment {
    /// Filename declared by the client.
    pub filename: String,

    /// Content type declared by the client.
    pub content_type: String,

    /// Raw payload.
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Opaque key a blob is stored under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension part of the key (after the last `.`), if any.
    #[cfg(test)]
    pub fn extension(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata the blob store keeps alongside a stored payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlobMeta {
    /// Key the payload is stored under.
    pub key: StorageKey,

    /// Content type recorded at write time.
    pub content_type: String,

    /// Payload size in bytes.
    pub size_bytes: u64,

    /// Hex MD5 of the payload.
    pub etag: String,

    /// When the write completed.
    pub stored_at: DateTime<Utc>,
}

impl BlobMeta {
    pub fn for_payload(key: StorageKey, content_type: &str, bytes: &[u8]) -> Self {
        Self {
            key,
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
            etag: format!("{:x}", md5::compute(bytes)),
            stored_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_extension() {
        assert_eq!(StorageKey::new("abc-1.png").extension(), Some("png"));
        assert_eq!(StorageKey::new("abc-1").extension(), None);
    }

    #[test]
    fn blob_meta_computes_md5_etag() {
        let meta = BlobMeta::for_payload(StorageKey::new("k.png"), "image/png", b"hello");
        assert_eq!(meta.etag, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(meta.size_bytes, 5);
    }
}
