//! Core data models for the catalog service.
//!
//! `CatalogRecord` maps to the catalog table via `sqlx::FromRow` and
//! serializes as JSON via `serde`; the attachment types describe an upload
//! on its way into the blob store.

pub mod attachment;
pub mod form;
pub mod record;
