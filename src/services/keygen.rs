//! Storage key generation.

use crate::models::attachment::StorageKey;
use chrono::Utc;
use uuid::Uuid;

/// Derive a fresh storage key for an upload named `original_filename`.
///
/// Keys look like `<uuid-v4>-<unix-millis>.<ext>`; uniqueness comes from the
/// random UUID, the timestamp only helps humans reading a listing.
pub fn generate_key(original_filename: &str) -> StorageKey {
    generate_key_at(original_filename, Utc::now().timestamp_millis())
}

pub fn generate_key_at(original_filename: &str, millis: i64) -> StorageKey {
    let token = Uuid::new_v4();
    match extension_of(original_filename) {
        Some(ext) => StorageKey::new(format!("{token}-{millis}.{ext}")),
        None => StorageKey::new(format!("{token}-{millis}")),
    }
}

fn extension_of(filename: &str) -> Option<&str> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}
