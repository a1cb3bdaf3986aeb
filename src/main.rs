use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, StorageBackend};
use services::{
    blob_store::{BlobStore, FsBlobStore, MemoryBlobStore},
    catalog_store::{CatalogStore, MemoryCatalogStore, SqliteCatalogStore},
    orchestrator::RecordOrchestrator,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting catalog-service with config: {:?}", cfg);

    // --- Initialize stores ---
    let (blobs, catalog): (Arc<dyn BlobStore>, Arc<dyn CatalogStore>) = match cfg.backend {
        StorageBackend::Local => {
            let blobs = FsBlobStore::new(&cfg.blob_dir)
                .await
                .with_context(|| format!("opening blob directory {}", cfg.blob_dir))?;
            let catalog = open_sqlite_catalog(&cfg.database_url).await?;
            catalog.migrate().await.context("running catalog migrations")?;

            // --- Handle migration mode ---
            if migrate {
                tracing::info!("Database migration complete.");
                return Ok(()); // exit after migration
            }
            (Arc::new(blobs), Arc::new(catalog))
        }
        StorageBackend::Memory => {
            if migrate {
                tracing::info!("Memory backend has nothing to migrate.");
                return Ok(());
            }
            tracing::warn!("Using in-memory stores; data is lost on shutdown");
            (
                Arc::new(MemoryBlobStore::new()),
                Arc::new(MemoryCatalogStore::new()),
            )
        }
    };

    // --- Initialize core service ---
    let orchestrator = RecordOrchestrator::new(blobs, catalog, cfg.orchestrator_config());
    let state = AppState {
        orchestrator,
        max_upload_bytes: cfg.max_upload_bytes,
    };

    // --- Build router ---
    let app = routes::routes::routes(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Connect to the SQLite catalog, creating the database file and its parent
/// directory when missing.
async fn open_sqlite_catalog(db_url: &str) -> Result<SqliteCatalogStore> {
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database URL {db_url}"))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {db_url}"))?;

    Ok(SqliteCatalogStore::new(Arc::new(pool)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
