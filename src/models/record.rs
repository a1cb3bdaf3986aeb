//! Represents a catalog entry, the unit persisted in the catalog store.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single catalog entry.
///
/// The record only carries a URL to its image; the image bytes live in the
/// blob store under the key embedded at the end of `image_reference`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Caller-supplied primary key.
    pub id: i64,

    /// Free-text display name.
    pub name: String,

    /// Stock quantity; 0 when the submitted value was missing or unparseable.
    pub quantity: i64,

    /// Public URL of the stored image, built from the configured base URL and
    /// the storage key.
    pub image_reference: String,
}
