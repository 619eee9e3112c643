//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `--config <path>` on the command line
//! 2. `$IMAPATTACH_CONFIG` (environment variable)
//! 3. `~/.config/imapattach/config.toml` (Linux/macOS)
//!    `%APPDATA%\imapattach\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};
use crate::imap::{ConnectionSettings, Transport};
use crate::search::DEFAULT_CHARSET;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// IMAP account to fetch from.
    pub account: AccountConfig,
    /// Fetch defaults.
    pub fetch: FetchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// IMAP account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Server host name.
    pub host: Option<String>,
    /// Server port (993 for TLS, 143 for STARTTLS).
    pub port: u16,
    /// Login name.
    pub user: Option<String>,
    /// Password. Prefer the `IMAPATTACH_PASSWORD` environment variable.
    pub password: Option<String>,
    /// Mailbox to search, opened read-only.
    pub mailbox: String,
    /// "tls" or "starttls".
    pub transport: Transport,
    /// Verify the server certificate.
    pub validate_certs: bool,
}

/// Fetch defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Where attachments are saved. Defaults to the system temp directory.
    pub save_dir: Option<PathBuf>,
    /// Charset of the search strings.
    pub charset: String,
    /// Look for attachments inside nested multiparts too.
    pub nested_parts: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 993,
            user: None,
            password: None,
            mailbox: "INBOX".to_string(),
            transport: Transport::Tls,
            validate_certs: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            charset: DEFAULT_CHARSET.to_string(),
            nested_parts: false,
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("mailbox", &self.mailbox)
            .field("transport", &self.transport)
            .field("validate_certs", &self.validate_certs)
            .finish()
    }
}

impl AccountConfig {
    /// Turn the account section into connection settings.
    ///
    /// Host and user are required; a missing password is treated as empty.
    /// `source` is the config file the section came from, used in errors.
    pub fn connection_settings(&self, source: &Path) -> Result<ConnectionSettings> {
        let missing = |field: &str| FetchError::Config {
            path: source.to_path_buf(),
            reason: format!("account.{field} is not set"),
        };
        let host = self.host.clone().ok_or_else(|| missing("host"))?;
        let user = self.user.clone().ok_or_else(|| missing("user"))?;

        Ok(ConnectionSettings {
            user,
            password: self.password.clone().unwrap_or_default(),
            host,
            port: self.port,
            mailbox: self.mailbox.clone(),
            transport: self.transport,
            validate_certs: self.validate_certs,
        })
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit path. Unlike [`load_config`], any
/// failure is an error.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| FetchError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let cfg = toml::from_str::<Config>(&contents).map_err(|e| FetchError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("IMAPATTACH_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("imapattach").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imapattach")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("imapattach.log")
}
