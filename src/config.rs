use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr};

/// 5 MiB, the provider's recommended chunk size for large video uploads.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
/// Files above 100 MiB are split into chunks; smaller ones go in one request.
pub const DEFAULT_CHUNKED_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub media: MediaConfig,
}

/// Storage-provider settings shared by the signer, the URL builders and the uploader.
#[derive(Clone, Default)]
pub struct MediaConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Base URL of the provider upload API, e.g. `https://api.cloudinary.com`.
    pub upload_host: String,
    /// Base URL of the delivery CDN, e.g. `https://res.cloudinary.com`.
    pub cdn_host: String,
    pub chunk_size: u64,
    pub chunked_threshold: u64,
}

// Hand-written so the API secret never ends up in logs.
impl std::fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("upload_host", &self.upload_host)
            .field("cdn_host", &self.cdn_host)
            .field("chunk_size", &self.chunk_size)
            .field("chunked_threshold", &self.chunked_threshold)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "TechTube video upload service")]
pub struct Args {
    /// Host to bind to (overrides TECHTUBE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TECHTUBE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides TECHTUBE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Storage provider cloud name (overrides TECHTUBE_CLOUDINARY_CLOUD_NAME)
    #[arg(long)]
    pub cloud_name: Option<String>,

    /// Upload chunk size in bytes (overrides TECHTUBE_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Upload a video file through the provider and register it in the catalog
    Upload(UploadArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct UploadArgs {
    /// Local video file to upload
    pub file: PathBuf,

    /// Title of the catalog entry
    #[arg(long)]
    pub title: String,

    /// Optional description of the catalog entry
    #[arg(long)]
    pub description: Option<String>,

    /// Base URL of a running TechTube server (overrides TECHTUBE_SERVER_URL)
    #[arg(long)]
    pub server: Option<String>,

    /// Session token used as bearer credential (overrides TECHTUBE_SESSION_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Provider folder the asset is stored in
    #[arg(long, default_value = "videos")]
    pub folder: String,
}

/// What the binary was asked to do.
#[derive(Debug, Clone)]
pub enum RunMode {
    Serve,
    Migrate,
    Upload(UploadArgs),
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("TECHTUBE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse::<u16>("TECHTUBE_PORT", 3000)?;
        let env_db = env::var("TECHTUBE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/techtube.db".into());
        let env_chunk = env_parse::<u64>("TECHTUBE_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let env_threshold =
            env_parse::<u64>("TECHTUBE_CHUNKED_THRESHOLD", DEFAULT_CHUNKED_THRESHOLD)?;

        let media = MediaConfig {
            cloud_name: args
                .cloud_name
                .or_else(|| env_opt("TECHTUBE_CLOUDINARY_CLOUD_NAME")),
            api_key: env_opt("TECHTUBE_CLOUDINARY_API_KEY"),
            api_secret: env_opt("TECHTUBE_CLOUDINARY_API_SECRET"),
            upload_host: env::var("TECHTUBE_CLOUDINARY_UPLOAD_HOST")
                .unwrap_or_else(|_| "https://api.cloudinary.com".into()),
            cdn_host: env::var("TECHTUBE_CLOUDINARY_CDN_HOST")
                .unwrap_or_else(|_| "https://res.cloudinary.com".into()),
            chunk_size: args.chunk_size.unwrap_or(env_chunk),
            chunked_threshold: env_threshold,
        };

        if media.chunk_size == 0 {
            anyhow::bail!("chunk size must be greater than zero");
        }

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            media,
        };

        let mode = match args.command {
            Some(Command::Upload(upload)) => RunMode::Upload(upload),
            None if args.migrate => RunMode::Migrate,
            None => RunMode::Serve,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read a variable, treating unset and blank the same.
fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
