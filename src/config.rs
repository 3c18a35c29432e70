use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments into one immutable value
/// handed to the pipeline at startup; there is no ambient global state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Root directory of the disk-backed object store.
    pub storage_dir: String,
    /// Directory for request-scoped staged files.
    pub scratch_dir: String,
    /// Bucket new uploads are placed in.
    pub bucket: String,
    /// Base URL presigned links are rooted at.
    pub public_base_url: String,
    pub jwt_secret: String,
    pub signing_secret: String,
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video hosting backend with media ingestion pipeline")]
pub struct Args {
    /// Host to bind to (overrides CLIPVAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CLIPVAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides CLIPVAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory where stored objects live (overrides CLIPVAULT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Directory for staged upload files (overrides CLIPVAULT_SCRATCH_DIR)
    #[arg(long)]
    pub scratch_dir: Option<String>,

    /// Bucket name for new uploads (overrides CLIPVAULT_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Public base URL for signed links (overrides CLIPVAULT_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Path to the ffprobe binary (overrides CLIPVAULT_FFPROBE_PATH)
    #[arg(long)]
    pub ffprobe_path: Option<String>,

    /// Path to the ffmpeg binary (overrides CLIPVAULT_FFMPEG_PATH)
    #[arg(long)]
    pub ffmpeg_path: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("CLIPVAULT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("CLIPVAULT_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing CLIPVAULT_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading CLIPVAULT_PORT"),
        };
        let env_db = env::var("CLIPVAULT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/clipvault.db".into());
        let env_storage =
            env::var("CLIPVAULT_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_scratch =
            env::var("CLIPVAULT_SCRATCH_DIR").unwrap_or_else(|_| "./data/scratch".into());
        let env_bucket =
            env::var("CLIPVAULT_BUCKET").unwrap_or_else(|_| "clipvault-media".into());
        let env_public_base = env::var("CLIPVAULT_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", args.port.unwrap_or(env_port)));
        // Secrets have no defaults worth shipping; both are required.
        let jwt_secret =
            env::var("CLIPVAULT_JWT_SECRET").context("reading CLIPVAULT_JWT_SECRET")?;
        let signing_secret =
            env::var("CLIPVAULT_SIGNING_SECRET").context("reading CLIPVAULT_SIGNING_SECRET")?;
        let env_ffprobe =
            env::var("CLIPVAULT_FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".into());
        let env_ffmpeg = env::var("CLIPVAULT_FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            scratch_dir: args.scratch_dir.unwrap_or(env_scratch),
            bucket: args.bucket.unwrap_or(env_bucket),
            public_base_url: args.public_base_url.unwrap_or(env_public_base),
            jwt_secret,
            signing_secret,
            ffprobe_path: args.ffprobe_path.unwrap_or(env_ffprobe),
            ffmpeg_path: args.ffmpeg_path.unwrap_or(env_ffmpeg),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
