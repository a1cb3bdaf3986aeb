use crate::services::orchestrator::{OrchestratorConfig, OrphanPolicy};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

/// Upload ceiling enforced before a request reaches the orchestrator.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2_000_000;

/// Which pair of stores the service runs against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Blobs on local disk, catalog in SQLite.
    #[default]
    Local,
    /// Both stores in process memory; nothing survives a restart.
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: StorageBackend,
    pub blob_dir: String,
    pub database_url: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub request_timeout: Option<Duration>,
    pub orphan_policy: OrphanPolicy,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image catalog service")]
pub struct Args {
    /// Host to bind to (overrides CATALOG_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CATALOG_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend (overrides CATALOG_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<StorageBackend>,

    /// Directory where image blobs are stored (overrides CATALOG_BLOB_DIR)
    #[arg(long)]
    pub blob_dir: Option<String>,

    /// Catalog database URL (overrides CATALOG_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL image references are built from (overrides CATALOG_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Largest accepted image in bytes (overrides CATALOG_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Per-request deadline in milliseconds, 0 disables it (overrides CATALOG_REQUEST_TIMEOUT_MS)
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// What to do with a stored image whose catalog write failed (overrides CATALOG_ORPHAN_POLICY)
    #[arg(long, value_enum)]
    pub orphan_policy: Option<OrphanPolicy>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

/// Read an environment variable, treating "not set" as `None`.
fn read_env(name: &str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {name}")),
    }
}

fn parse_var<T>(value: Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("parsing {name} value `{raw}`"))
        })
        .transpose()
}

fn parse_enum_var<T: ValueEnum>(value: Option<String>, name: &str) -> Result<Option<T>> {
    value
        .map(|raw| {
            T::from_str(&raw, true).map_err(|err| anyhow!("parsing {name} value `{raw}`: {err}"))
        })
        .transpose()
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::resolve(args, read_env)?, migrate))
    }

    /// Merge CLI args over environment values over defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let env_port = parse_var::<u16>(lookup("CATALOG_PORT")?, "CATALOG_PORT")?;
        let env_max = parse_var::<usize>(
            lookup("CATALOG_MAX_UPLOAD_BYTES")?,
            "CATALOG_MAX_UPLOAD_BYTES",
        )?;
        let env_timeout = parse_var::<u64>(
            lookup("CATALOG_REQUEST_TIMEOUT_MS")?,
            "CATALOG_REQUEST_TIMEOUT_MS",
        )?;
        let env_backend = parse_enum_var(lookup("CATALOG_BACKEND")?, "CATALOG_BACKEND")?;
        let env_policy =
            parse_enum_var(lookup("CATALOG_ORPHAN_POLICY")?, "CATALOG_ORPHAN_POLICY")?;

        let port = args.port.or(env_port).unwrap_or(3000);
        let timeout_ms = args.request_timeout_ms.or(env_timeout).unwrap_or(30_000);

        let public_base_url = match args.public_base_url {
            Some(url) => url,
            None => lookup("CATALOG_PUBLIC_BASE_URL")?
                .unwrap_or_else(|| format!("http://localhost:{port}/images")),
        };

        Ok(Self {
            host: args
                .host
                .or(lookup("CATALOG_HOST")?)
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            backend: args.backend.or(env_backend).unwrap_or_default(),
            blob_dir: args
                .blob_dir
                .or(lookup("CATALOG_BLOB_DIR")?)
                .unwrap_or_else(|| "./data/blobs".into()),
            database_url: args
                .database_url
                .or(lookup("CATALOG_DATABASE_URL")?)
                .unwrap_or_else(|| "sqlite://./data/meta/catalog.db".into()),
            public_base_url,
            max_upload_bytes: args
                .max_upload_bytes
                .or(env_max)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            request_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            orphan_policy: args.orphan_policy.or(env_policy).unwrap_or_default(),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            public_base_url: self.public_base_url.clone(),
            orphan_policy: self.orphan_policy,
            request_timeout: self.request_timeout,
        }
    }
}
