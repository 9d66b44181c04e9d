// Obscura — Configuration
//
// Loaded from a TOML file with per-section defaults, then overridden from
// the environment. A missing file is not an error; every field has a usable
// default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::{DEFAULT_M_COST, DEFAULT_P_COST, DEFAULT_T_COST};

pub const ENV_DB_PATH: &str = "OBSCURA_DB_PATH";
pub const ENV_SOCKET_PATH: &str = "OBSCURA_SOCKET_PATH";
pub const ENV_DEBUG: &str = "OBSCURA_DEBUG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub hashing: HashingConfig,
    pub log: LogConfig,
}

/// Unix socket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Socket file permissions (octal)
    pub socket_mode: u32,
    /// Connections served at once; further clients wait in accept
    pub max_connections: usize,
    /// Deadline for each request, in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: usize,
    /// Upper bound on SQLite lock waits outside a request deadline
    pub busy_timeout_ms: u64,
}

/// Argon2id cost parameters for new password hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));

        Self {
            socket_path: runtime_dir.join("obscura").join("obscura.sock"),
            socket_mode: 0o600,
            max_connections: 64,
            request_timeout_secs: 10,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("obscura").join("obscura.db"),
            pool_size: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_M_COST,
            iterations: DEFAULT_T_COST,
            parallelism: DEFAULT_P_COST,
        }
    }
}

impl Config {
    /// Default config file location: `<config_dir>/obscura/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("obscura")
            .join("config.toml")
    }

    /// Load from `path` (or the default location), apply environment
    /// overrides and validate.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    tracing::debug!(path = %default.display(), "No config file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `OBSCURA_*` overrides. `lookup` stands in for the process
    /// environment so tests need not mutate it.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_SOCKET_PATH).filter(|v| !v.is_empty()) {
            self.server.socket_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            self.log.debug = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_size == 0 {
            return Err(ConfigError::Invalid("database.pool_size must be at least 1".into()));
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::Invalid("server.max_connections must be at least 1".into()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("server.request_timeout_secs must be positive".into()));
        }
        if self.server.socket_mode > 0o777 {
            return Err(ConfigError::Invalid(format!(
                "server.socket_mode {:o} is not a permission mode",
                self.server.socket_mode
            )));
        }
        if self.hashing.iterations == 0 || self.hashing.parallelism == 0 {
            return Err(ConfigError::Invalid(
                "hashing.iterations and hashing.parallelism must be positive".into(),
            ));
        }
        if self.hashing.memory_kib < 8 * self.hashing.parallelism {
            return Err(ConfigError::Invalid(
                "hashing.memory_kib must be at least 8 * parallelism".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
