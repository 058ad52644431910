use std::env;
use std::path::PathBuf;

/// Runtime configuration for the asset ingestion pipeline
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding transient staged copies (default: ./uploads)
    pub staging_dir: PathBuf,

    /// Maximum upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Seconds between staging sweeps (default: 3600)
    pub staging_sweep_interval_secs: u64,

    /// Age in hours after which an orphaned staged file is swept (default: 24)
    pub staging_max_age_hours: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./uploads"),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            staging_sweep_interval_secs: 3600,
            staging_max_age_hours: 24,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            staging_sweep_interval_secs: env::var("STAGING_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.staging_sweep_interval_secs),

            staging_max_age_hours: env::var("STAGING_MAX_AGE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.staging_max_age_hours),
        }
    }

    /// Create config for development (relaxed limits, frequent sweeps)
    pub fn development() -> Self {
        Self {
            staging_dir: PathBuf::from("./uploads"),
            max_file_size: 1024 * 1024 * 1024, // 1 GB
            staging_sweep_interval_secs: 300,
            staging_max_age_hours: 1,
        }
    }
}

/// Credentials and endpoint for the remote asset store. Read once at
/// startup and injected into the commit client, never per request.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

impl CloudConfig {
    /// Load credentials from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;

        Ok(Self {
            cloud_name: env::var("CLOUDINARY_CLOUD_NAME")
                .context("CLOUDINARY_CLOUD_NAME must be set")?,
            api_key: env::var("CLOUDINARY_API_KEY").context("CLOUDINARY_API_KEY must be set")?,
            api_secret: env::var("CLOUDINARY_API_SECRET")
                .context("CLOUDINARY_API_SECRET must be set")?,
            api_base: env::var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|_| "https://api.cloudinary.com".to_string()),
        })
    }
}
