use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub storage: StorageConfig,

    pub uploads: UploadsConfig,

    pub web: WebConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads.
    /// Set to 0 to use the tokio default (one per CPU core).
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Allowed CORS origins. Empty or containing "*" means any origin.
    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Enable when the service sits behind HTTPS.
    pub secure_cookies: bool,

    /// Session inactivity expiry in minutes.
    pub session_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_allowed_origins: vec![],
            secure_cookies: false,
            session_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the semicolon-delimited record table.
    pub table_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            table_path: "data/records.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Directory profile photos are stored in, served under /uploads.
    pub dir: String,

    /// Maximum accepted photo size in bytes (default: 2 MiB).
    pub max_photo_bytes: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_photo_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Directory the static frontend is served from.
    pub root: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            root: "web".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_iterations: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_kib: 8192,
            argon2_iterations: 3,
            argon2_parallelism: 1,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("kartoteka").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".kartoteka").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.storage.table_path.trim().is_empty() {
            anyhow::bail!("Storage table path cannot be empty");
        }

        if self.server.session_minutes <= 0 {
            anyhow::bail!("Session expiry must be at least one minute");
        }

        if self.uploads.max_photo_bytes == 0 {
            anyhow::bail!("Photo size limit cannot be 0");
        }

        if self.security.argon2_memory_kib == 0
            || self.security.argon2_iterations == 0
            || self.security.argon2_parallelism == 0
        {
            anyhow::bail!("Argon2 parameters must all be at least 1");
        }

        Ok(())
    }
}
