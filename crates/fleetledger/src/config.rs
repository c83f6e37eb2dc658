//! Configuration management for fleetledger.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::broadcast::DEFAULT_OBSERVER_BUFFER;
use crate::error::{Error, Result};
use crate::ledger::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, MIN_LIST_LIMIT};
use crate::models::MIN_PASSWORD_LENGTH;
use crate::server::DEFAULT_MAX_LINE_BYTES;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "fleetledger";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "fleetledger.db";

/// Smallest line cap that still fits a login handshake.
const MIN_LINE_BYTES: usize = 256;

/// Environment variable prefix.
const ENV_PREFIX: &str = "FLEETLEDGER_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLEETLEDGER_`, sections split
///    on `__`, e.g. `FLEETLEDGER_AUTH__JWT_SECRET`)
/// 2. TOML config file at `~/.config/fleetledger/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Gateway server configuration.
    pub server: ServerConfig,
    /// Ledger configuration.
    pub ledger: LedgerConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/fleetledger/fleetledger.db`
    pub database_path: Option<PathBuf>,
}

/// Authentication-related configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Required to serve.
    pub jwt_secret: Option<String>,
    /// Session token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Minimum accepted password length.
    pub min_password_length: usize,
}

/// Gateway server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the gateway listens on.
    pub listen_addr: String,
    /// Pushes queued per observer before new ones are dropped.
    pub observer_buffer: usize,
    /// Longest accepted request line, in bytes.
    pub max_line_bytes: usize,
}

/// Ledger-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Page size for audit listings that don't ask for one.
    pub default_list_limit: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 8 * 60 * 60,
            min_password_length: MIN_PASSWORD_LENGTH,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("min_password_length", &self.min_password_length)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7878".to_string(),
            observer_buffer: DEFAULT_OBSERVER_BUFFER,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `FLEETLEDGER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.auth.jwt_secret, Some(secret) if secret.trim().is_empty()) {
            return Err(invalid("auth.jwt_secret must not be empty"));
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(invalid("auth.token_ttl_secs must be greater than 0"));
        }

        if self.auth.min_password_length == 0 {
            return Err(invalid("auth.min_password_length must be greater than 0"));
        }

        if self.server.observer_buffer == 0 {
            return Err(invalid("server.observer_buffer must be greater than 0"));
        }
        if self.server.max_line_bytes < MIN_LINE_BYTES {
            return Err(invalid(format!(
                "server.max_line_bytes must be at least {MIN_LINE_BYTES}"
            )));
        }

        self.listen_addr()?;

        let limit = self.ledger.default_list_limit;
        if !(MIN_LIST_LIMIT..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(invalid(format!(
                "ledger.default_list_limit ({limit}) must be between {MIN_LIST_LIMIT} and {MAX_LIST_LIMIT}"
            )));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the token signing secret.
    ///
    /// # Errors
    ///
    /// Returns an error if no secret is configured.
    pub fn jwt_secret(&self) -> Result<&str> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => Ok(secret),
            _ => Err(invalid(
                "auth.jwt_secret is not set (set FLEETLEDGER_AUTH__JWT_SECRET or add it to the config file)",
            )),
        }
    }

    /// Get the session token lifetime.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_secs)
    }

    /// Parse the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen_addr.parse().map_err(|_| {
            invalid(format!(
                "server.listen_addr '{}' is not a socket address",
                self.server.listen_addr
            ))
        })
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
