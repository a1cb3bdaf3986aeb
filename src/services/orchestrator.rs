//! RecordOrchestrator: drives the blob-then-catalog dual write.
//!
//! A create runs through `Received → Validated → BlobWritten → Committed`.
//! The catalog write never starts before the blob write finished, so a
//! record always implies its blob was attempted. The reverse does not hold:
//! if the catalog write fails after the blob landed, the blob is orphaned.
//! A blob write cut off by the deadline may also have landed. What happens
//! to such blobs is governed by [`OrphanPolicy`].
//!
//! Batch deletes are sequential and stop at the first failure; ids deleted
//! before the failure stay deleted.

use crate::{
    models::{
        attachment::StorageKey,
        form::CreateRecordRequest,
        record::CatalogRecord,
    },
    services::{
        blob_store::{BlobStore, BlobStoreError},
        catalog_store::{CatalogStore, CatalogStoreError},
        keygen,
        validator::{self, MediaTypeError},
    },
};
use std::{collections::HashSet, fmt, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// What to do with a blob whose catalog write failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OrphanPolicy {
    /// Leave the blob in place and report its key.
    #[default]
    Keep,
    /// Delete the just-written blob (best effort).
    Remove,
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Prefix for `image_reference` URLs; the storage key is appended.
    pub public_base_url: String,
    pub orphan_policy: OrphanPolicy,
    /// Deadline applied to each flow as a whole. `None` disables it.
    pub request_timeout: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateStage {
    Received,
    Validated,
    BlobWritten,
    Committed,
}

impl fmt::Display for CreateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreateStage::Received => "received",
            CreateStage::Validated => "validated",
            CreateStage::BlobWritten => "blob_written",
            CreateStage::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("no image uploaded")]
    NoAttachment,
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(#[from] MediaTypeError),
    #[error("writing blob `{key}` failed")]
    BlobWrite {
        key: StorageKey,
        #[source]
        source: BlobStoreError,
    },
    /// The blob was written but the record was not. `orphaned_blob` is set
    /// when the blob may still be in the store.
    #[error("writing catalog record {id} failed")]
    CatalogWrite {
        id: i64,
        orphaned_blob: Option<StorageKey>,
        #[source]
        source: CatalogStoreError,
    },
    /// The flow ran out of time while moving into `stage`. `orphaned_blob`
    /// is set when a blob may have been left behind.
    #[error("deadline exceeded while reaching stage {stage}")]
    DeadlineExceeded {
        stage: CreateStage,
        orphaned_blob: Option<StorageKey>,
    },
}

/// Failure of a single catalog call issued by list or delete.
#[derive(Debug, Error)]
pub enum CatalogOpError {
    #[error(transparent)]
    Store(#[from] CatalogStoreError),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug)]
pub struct FailedDelete {
    pub id: i64,
    pub error: CatalogOpError,
}

/// Per-id result of a batch delete.
#[derive(Debug, Default)]
pub struct BatchDeleteOutcome {
    pub deleted: Vec<i64>,
    pub failed: Option<FailedDelete>,
    pub not_attempted: Vec<i64>,
}

impl BatchDeleteOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

/// Run `fut` against an optional deadline. Returns `None` if the deadline
/// passed first; the future is dropped at that point.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[derive(Clone)]
pub struct RecordOrchestrator {
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<dyn CatalogStore>,
    config: OrchestratorConfig,
}

impl RecordOrchestrator {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<dyn CatalogStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            blobs,
            catalog,
            config,
        }
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn catalog_store(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    fn deadline(&self) -> Option<Instant> {
        self.config
            .request_timeout
            .map(|timeout| Instant::now() + timeout)
    }

    fn image_reference(&self, key: &StorageKey) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            key
        )
    }

    /// Validate, store the blob, then commit the catalog record.
    #[instrument(skip(self, request), fields(id = request.id))]
    pub async fn create(&self, request: CreateRecordRequest) -> Result<CatalogRecord, CreateError> {
        let deadline = self.deadline();
        debug!(stage = %CreateStage::Received, "create flow started");

        let attachment = request.attachment.ok_or(CreateError::NoAttachment)?;
        validator::validate(&attachment.filename, &attachment.content_type)?;
        debug!(stage = %CreateStage::Validated, filename = %attachment.filename, "attachment accepted");

        let key = keygen::generate_key(&attachment.filename);
        let put = self
            .blobs
            .put(&key, attachment.bytes, &attachment.content_type);
        match within(deadline, put).await {
            Some(Ok(meta)) => {
                debug!(stage = %CreateStage::BlobWritten, key = %key, size = meta.size_bytes, "blob stored");
            }
            Some(Err(source)) => return Err(CreateError::BlobWrite { key, source }),
            None => {
                // the dropped put may already have stored the payload
                return Err(CreateError::DeadlineExceeded {
                    stage: CreateStage::BlobWritten,
                    orphaned_blob: self.resolve_orphan(&key).await,
                });
            }
        }

        let record = CatalogRecord {
            id: request.id,
            name: request.name,
            quantity: request.quantity,
            image_reference: self.image_reference(&key),
        };

        match within(deadline, self.catalog.put(&record)).await {
            Some(Ok(())) => {
                info!(stage = %CreateStage::Committed, key = %key, "catalog record created");
                Ok(record)
            }
            Some(Err(source)) => Err(CreateError::CatalogWrite {
                id: record.id,
                orphaned_blob: self.resolve_orphan(&key).await,
                source,
            }),
            None => Err(CreateError::DeadlineExceeded {
                stage: CreateStage::Committed,
                orphaned_blob: self.resolve_orphan(&key).await,
            }),
        }
    }

    /// Apply the orphan policy to a blob whose record never got written.
    /// Returns the key if the blob may still be stored.
    async fn resolve_orphan(&self, key: &StorageKey) -> Option<StorageKey> {
        match self.config.orphan_policy {
            OrphanPolicy::Keep => {
                warn!(key = %key, "blob may be stored without a catalog record");
                Some(key.clone())
            }
            OrphanPolicy::Remove => match self.blobs.delete(key).await {
                Ok(true) => {
                    info!(key = %key, "removed blob after failed catalog write");
                    None
                }
                Ok(false) => {
                    debug!(key = %key, "no blob to remove after failed create");
                    None
                }
                Err(err) => {
                    error!(key = %key, error = %err, "could not remove orphaned blob");
                    Some(key.clone())
                }
            },
        }
    }

    /// Delete every id in order, stopping at the first failure.
    #[instrument(skip(self, ids))]
    pub async fn delete_many<I>(&self, ids: I) -> BatchDeleteOutcome
    where
        I: IntoIterator<Item = i64>,
    {
        let mut seen = HashSet::new();
        let ids: Vec<i64> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        let deadline = self.deadline();
        let mut outcome = BatchDeleteOutcome::default();

        for (idx, id) in ids.iter().copied().enumerate() {
            let result = match within(deadline, self.catalog.delete(id)).await {
                Some(result) => result.map_err(CatalogOpError::from),
                None => Err(CatalogOpError::DeadlineExceeded),
            };

            match result {
                Ok(()) => outcome.deleted.push(id),
                Err(error) => {
                    outcome.failed = Some(FailedDelete { id, error });
                    outcome.not_attempted = ids[idx + 1..].to_vec();
                    break;
                }
            }
        }

        debug!(
            deleted = outcome.deleted.len(),
            failed = outcome.failed.is_some(),
            "batch delete finished"
        );
        outcome
    }

    /// Every catalog record, unpaginated.
    pub async fn list(&self) -> Result<Vec<CatalogRecord>, CatalogOpError> {
        match within(self.deadline(), self.catalog.scan()).await {
            Some(result) => Ok(result?),
            None => Err(CatalogOpError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{attachment::Attachment, attachment::BlobMeta},
        services::{
            blob_store::{BlobDownload, BlobResult, MemoryBlobStore},
            catalog_store::{CatalogResult, MemoryCatalogStore},
        },
    };
    use async_trait::async_trait;
    use bytes::Bytes;

    const BASE_URL: &str = "https://cdn.example.test/images/";

    // -- Test doubles -----------------------------------------------------

    /// Memory catalog that can be told to fail or stall puts, or fail a
    /// specific delete.
    #[derive(Default)]
    struct FlakyCatalog {
        inner: MemoryCatalogStore,
        fail_puts: bool,
        put_delay: Option<Duration>,
        fail_delete_of: Option<i64>,
    }

    #[async_trait]
    impl CatalogStore for FlakyCatalog {
        async fn put(&self, record: &CatalogRecord) -> CatalogResult<()> {
            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_puts {
                return Err(CatalogStoreError::Unavailable("injected".into()));
            }
            self.inner.put(record).await
        }

        async fn scan(&self) -> CatalogResult<Vec<CatalogRecord>> {
            self.inner.scan().await
        }

        async fn delete(&self, id: i64) -> CatalogResult<()> {
            if self.fail_delete_of == Some(id) {
                return Err(CatalogStoreError::Unavailable("injected".into()));
            }
            self.inner.delete(id).await
        }

        async fn health_check(&self) -> CatalogResult<()> {
            Ok(())
        }
    }

    /// Blob store that fails every put, or sleeps before or after
    /// delegating.
    #[derive(Default)]
    struct FlakyBlobs {
        inner: Arc<MemoryBlobStore>,
        fail_puts: bool,
        put_delay: Option<Duration>,
        stall_after_write: Option<Duration>,
    }

    #[async_trait]
    impl BlobStore for FlakyBlobs {
        async fn put(
            &self,
            key: &StorageKey,
            bytes: Bytes,
            content_type: &str,
        ) -> BlobResult<BlobMeta> {
            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_puts {
                return Err(BlobStoreError::Unavailable("injected".into()));
            }
            let meta = self.inner.put(key, bytes, content_type).await?;
            if let Some(stall) = self.stall_after_write {
                tokio::time::sleep(stall).await;
            }
            Ok(meta)
        }

        async fn get(&self, key: &StorageKey) -> BlobResult<BlobDownload> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &StorageKey) -> BlobResult<bool> {
            self.inner.delete(key).await
        }

        async fn health_check(&self) -> BlobResult<()> {
            Ok(())
        }
    }

    // -- Helpers ----------------------------------------------------------

    fn config(orphan_policy: OrphanPolicy, request_timeout: Option<Duration>) -> OrchestratorConfig {
        OrchestratorConfig {
            public_base_url: BASE_URL.into(),
            orphan_policy,
            request_timeout,
        }
    }

    fn request(id: i64, attachment: Option<Attachment>) -> CreateRecordRequest {
        CreateRecordRequest {
            id,
            name: "Blue mug".into(),
            quantity: 4,
            attachment,
        }
    }

    fn png() -> Option<Attachment> {
        Some(Attachment::new("mug.png", "image/png", Bytes::from_static(b"\x89PNG")))
    }

    fn memory_orchestrator() -> (RecordOrchestrator, Arc<MemoryBlobStore>, Arc<MemoryCatalogStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let catalog = Arc::new(MemoryCatalogStore::new());
        let orchestrator = RecordOrchestrator::new(
            blobs.clone(),
            catalog.clone(),
            config(OrphanPolicy::Keep, None),
        );
        (orchestrator, blobs, catalog)
    }

    async fn seeded(ids: &[i64]) -> (RecordOrchestrator, Arc<MemoryCatalogStore>) {
        let (orchestrator, _, catalog) = memory_orchestrator();
        for id in ids {
            orchestrator.create(request(*id, png())).await.unwrap();
        }
        (orchestrator, catalog)
    }

    async fn sorted_ids(catalog: &dyn CatalogStore) -> Vec<i64> {
        let mut ids: Vec<i64> = catalog.scan().await.unwrap().iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids
    }

    fn key_of(record: &CatalogRecord) -> StorageKey {
        StorageKey::new(record.image_reference.trim_start_matches(BASE_URL))
    }

    // -- Create -----------------------------------------------------------

    #[tokio::test]
    async fn create_writes_blob_then_record() {
        let (orchestrator, blobs, catalog) = memory_orchestrator();

        let created = orchestrator.create(request(7, png())).await.unwrap();

        let records = catalog.scan().await.unwrap();
        assert_eq!(records, vec![created.clone()]);
        assert_eq!(created.id, 7);
        assert_eq!(created.name, "Blue mug");
        assert_eq!(created.quantity, 4);
        assert!(created.image_reference.starts_with(BASE_URL));
        assert!(created.image_reference.ends_with(".png"));
        assert!(!created.image_reference.contains("images//"));

        let key = key_of(&created);
        assert_eq!(key.extension(), Some("png"));
        assert!(blobs.contains(&key));
    }

    #[tokio::test]
    async fn create_without_attachment_touches_no_store() {
        let (orchestrator, blobs, catalog) = memory_orchestrator();

        let err = orchestrator.create(request(1, None)).await.unwrap_err();

        assert!(matches!(err, CreateError::NoAttachment));
        assert!(catalog.scan().await.unwrap().is_empty());
        assert_eq!(blobs.len(), 0);
    }

    #[tokio::test]
    async fn create_with_text_file_touches_no_store() {
        let (orchestrator, blobs, catalog) = memory_orchestrator();
        let txt = Attachment::new("notes.txt", "text/plain", Bytes::from_static(b"hi"));

        let err = orchestrator.create(request(1, Some(txt))).await.unwrap_err();

        assert!(matches!(err, CreateError::UnsupportedMediaType(_)));
        assert!(catalog.scan().await.unwrap().is_empty());
        assert_eq!(blobs.len(), 0);
    }

    #[tokio::test]
    async fn blob_failure_never_reaches_catalog() {
        let blobs = Arc::new(FlakyBlobs {
            fail_puts: true,
            ..FlakyBlobs::default()
        });
        let catalog = Arc::new(MemoryCatalogStore::new());
        let orchestrator =
            RecordOrchestrator::new(blobs, catalog.clone(), config(OrphanPolicy::Keep, None));

        let err = orchestrator.create(request(1, png())).await.unwrap_err();

        assert!(matches!(err, CreateError::BlobWrite { .. }));
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_failure_leaves_orphan_blob_when_kept() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let catalog = Arc::new(FlakyCatalog {
            fail_puts: true,
            ..FlakyCatalog::default()
        });
        let orchestrator = RecordOrchestrator::new(
            blobs.clone(),
            catalog.clone(),
            config(OrphanPolicy::Keep, None),
        );

        let err = orchestrator.create(request(5, png())).await.unwrap_err();

        let (id, orphaned_blob) = match err {
            CreateError::CatalogWrite {
                id, orphaned_blob, ..
            } => (id, orphaned_blob),
            other => panic!("expected CatalogWrite, got {other:?}"),
        };
        assert_eq!(id, 5);
        let key = orphaned_blob.expect("blob should be reported as orphaned");
        assert!(blobs.contains(&key));
        assert_eq!(blobs.len(), 1);
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_failure_removes_blob_when_policy_is_remove() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let catalog = Arc::new(FlakyCatalog {
            fail_puts: true,
            ..FlakyCatalog::default()
        });
        let orchestrator = RecordOrchestrator::new(
            blobs.clone(),
            catalog.clone(),
            config(OrphanPolicy::Remove, None),
        );

        let err = orchestrator.create(request(5, png())).await.unwrap_err();

        assert!(matches!(
            err,
            CreateError::CatalogWrite {
                orphaned_blob: None,
                ..
            }
        ));
        assert_eq!(blobs.len(), 0);
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    fn deadline_orchestrator(
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<dyn CatalogStore>,
        orphan_policy: OrphanPolicy,
    ) -> RecordOrchestrator {
        RecordOrchestrator::new(
            blobs,
            catalog,
            config(orphan_policy, Some(Duration::from_millis(20))),
        )
    }

    #[tokio::test]
    async fn slow_blob_write_hits_deadline_before_catalog() {
        let inner = Arc::new(MemoryBlobStore::new());
        let blobs = Arc::new(FlakyBlobs {
            inner: inner.clone(),
            put_delay: Some(Duration::from_secs(10)),
            ..FlakyBlobs::default()
        });
        let catalog = Arc::new(MemoryCatalogStore::new());
        let orchestrator = deadline_orchestrator(blobs, catalog.clone(), OrphanPolicy::Remove);

        let err = orchestrator.create(request(1, png())).await.unwrap_err();

        assert!(matches!(
            err,
            CreateError::DeadlineExceeded {
                stage: CreateStage::BlobWritten,
                orphaned_blob: None,
            }
        ));
        assert_eq!(inner.len(), 0);
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blob_landed_before_deadline_is_removed_when_policy_is_remove() {
        let inner = Arc::new(MemoryBlobStore::new());
        let blobs = Arc::new(FlakyBlobs {
            inner: inner.clone(),
            stall_after_write: Some(Duration::from_secs(10)),
            ..FlakyBlobs::default()
        });
        let catalog = Arc::new(MemoryCatalogStore::new());
        let orchestrator = deadline_orchestrator(blobs, catalog.clone(), OrphanPolicy::Remove);

        let err = orchestrator.create(request(1, png())).await.unwrap_err();

        assert!(matches!(
            err,
            CreateError::DeadlineExceeded {
                stage: CreateStage::BlobWritten,
                orphaned_blob: None,
            }
        ));
        assert_eq!(inner.len(), 0);
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blob_landed_before_deadline_is_reported_when_kept() {
        let inner = Arc::new(MemoryBlobStore::new());
        let blobs = Arc::new(FlakyBlobs {
            inner: inner.clone(),
            stall_after_write: Some(Duration::from_secs(10)),
            ..FlakyBlobs::default()
        });
        let catalog = Arc::new(MemoryCatalogStore::new());
        let orchestrator = deadline_orchestrator(blobs, catalog.clone(), OrphanPolicy::Keep);

        let err = orchestrator.create(request(1, png())).await.unwrap_err();

        let key = match err {
            CreateError::DeadlineExceeded {
                stage: CreateStage::BlobWritten,
                orphaned_blob: Some(key),
            } => key,
            other => panic!("expected blob-stage deadline with a key, got {other:?}"),
        };
        assert!(inner.contains(&key));
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_catalog_write_keeps_blob_when_kept() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let catalog = Arc::new(FlakyCatalog {
            put_delay: Some(Duration::from_secs(10)),
            ..FlakyCatalog::default()
        });
        let orchestrator = deadline_orchestrator(blobs.clone(), catalog.clone(), OrphanPolicy::Keep);

        let err = orchestrator.create(request(2, png())).await.unwrap_err();

        let key = match err {
            CreateError::DeadlineExceeded {
                stage: CreateStage::Committed,
                orphaned_blob: Some(key),
            } => key,
            other => panic!("expected catalog-stage deadline with a key, got {other:?}"),
        };
        assert!(blobs.contains(&key));
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_catalog_write_removes_blob_when_policy_is_remove() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let catalog = Arc::new(FlakyCatalog {
            put_delay: Some(Duration::from_secs(10)),
            ..FlakyCatalog::default()
        });
        let orchestrator =
            deadline_orchestrator(blobs.clone(), catalog.clone(), OrphanPolicy::Remove);

        let err = orchestrator.create(request(2, png())).await.unwrap_err();

        assert!(matches!(
            err,
            CreateError::DeadlineExceeded {
                stage: CreateStage::Committed,
                orphaned_blob: None,
            }
        ));
        assert_eq!(blobs.len(), 0);
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_id_is_last_write_wins() {
        let (orchestrator, blobs, catalog) = memory_orchestrator();

        orchestrator.create(request(3, png())).await.unwrap();
        let mut second = request(3, png());
        second.name = "Red mug".into();
        let latest = orchestrator.create(second).await.unwrap();

        assert_eq!(catalog.scan().await.unwrap(), vec![latest]);
        // both blobs remain; nothing links the first one any more
        assert_eq!(blobs.len(), 2);
    }

    // -- Delete -----------------------------------------------------------

    #[tokio::test]
    async fn delete_removes_only_requested_ids() {
        let (orchestrator, catalog) = seeded(&[1, 2, 3]).await;

        let outcome = orchestrator.delete_many([2]).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.deleted, vec![2]);
        assert_eq!(sorted_ids(catalog.as_ref()).await, vec![1, 3]);

        let outcome = orchestrator.delete_many(Vec::new()).await;
        assert!(outcome.is_success());
        assert!(outcome.deleted.is_empty());
        assert_eq!(sorted_ids(catalog.as_ref()).await, vec![1, 3]);

        let outcome = orchestrator.delete_many([99]).await;
        assert!(outcome.is_success());
        assert_eq!(sorted_ids(catalog.as_ref()).await, vec![1, 3]);
    }

    #[tokio::test]
    async fn delete_collapses_duplicate_ids() {
        let (orchestrator, catalog) = seeded(&[1, 2]).await;

        let outcome = orchestrator.delete_many([2, 2, 1, 2]).await;

        assert_eq!(outcome.deleted, vec![2, 1]);
        assert!(catalog.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_stops_at_first_failure_without_rollback() {
        let catalog = Arc::new(FlakyCatalog {
            fail_delete_of: Some(2),
            ..FlakyCatalog::default()
        });
        for id in [1, 2, 3] {
            catalog
                .inner
                .put(&CatalogRecord {
                    id,
                    name: format!("item {id}"),
                    quantity: 1,
                    image_reference: format!("{BASE_URL}{id}.png"),
                })
                .await
                .unwrap();
        }
        let orchestrator = RecordOrchestrator::new(
            Arc::new(MemoryBlobStore::new()),
            catalog.clone(),
            config(OrphanPolicy::Keep, None),
        );

        let outcome = orchestrator.delete_many([1, 2, 3]).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.deleted, vec![1]);
        let failed = outcome.failed.as_ref().unwrap();
        assert_eq!(failed.id, 2);
        assert!(matches!(failed.error, CatalogOpError::Store(_)));
        assert_eq!(outcome.not_attempted, vec![3]);
        assert_eq!(sorted_ids(catalog.as_ref()).await, vec![2, 3]);
    }

    #[tokio::test]
    async fn delete_never_touches_blobs() {
        let (orchestrator, blobs, _) = memory_orchestrator();
        let created = orchestrator.create(request(1, png())).await.unwrap();

        orchestrator.delete_many([1]).await;

        assert!(blobs.contains(&key_of(&created)));
    }

    // -- List -------------------------------------------------------------

    #[tokio::test]
    async fn list_of_empty_catalog_is_ok() {
        let (orchestrator, _, _) = memory_orchestrator();
        assert!(orchestrator.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_every_record() {
        let (orchestrator, _) = seeded(&[4, 5, 6]).await;
        let mut ids: Vec<i64> = orchestrator.list().await.unwrap().iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![4, 5, 6]);
    }

    #[test]
    fn image_reference_joins_with_single_slash() {
        let (orchestrator, _, _) = memory_orchestrator();
        let key = StorageKey::new("k.png");
        assert_eq!(
            orchestrator.image_reference(&key),
            "https://cdn.example.test/images/k.png"
        );
    }
}
