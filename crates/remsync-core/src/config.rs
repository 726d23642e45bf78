//! Configuration module for remsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::session_config::{
    DEFAULT_MAX_RETRIES, DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS,
};
use crate::domain::{
    Credentials, DomainError, RemoteEndpoint, RemotePath, SessionConfig, SyncDirection,
};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for remsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub transfer: TransferConfig,
    pub logging: LoggingConfig,
}

/// How to authenticate against the remote host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    Password,
    Key,
}

/// Remote endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Plain-text password. Prefer the keyring (`remsync auth set-password`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub auth_method: AuthMethod,
    /// Private key for `auth_method: key`; `~/.ssh/id_rsa` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_passphrase: Option<String>,
    /// Accepted SHA-256 host key fingerprints. Empty accepts any key.
    pub host_key_fingerprints: Vec<String>,
    /// Seconds allowed for connection establishment.
    pub dial_timeout_secs: u64,
}

/// What to synchronize and in which direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub direction: SyncDirection,
    /// Local root directory.
    pub local_root: PathBuf,
    /// Remote root directory.
    pub remote_root: String,
    /// Milliseconds between remote polling cycles (remote_to_local only).
    pub poll_interval_ms: u64,
    /// Glob patterns of names or relative paths never synchronized.
    pub ignore: Vec<String>,
}

/// Worker pool and retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Total attempts per transfer operation.
    pub max_retries: u32,
    /// Delay before the second attempt; doubled for every further attempt.
    pub retry_delay_ms: u64,
    /// Deadline for a single attempt of a remote operation.
    pub operation_timeout_secs: u64,
    /// How long shutdown waits for in-flight transfers.
    pub drain_timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/remsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("remsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: None,
            auth_method: AuthMethod::Password,
            key_file: None,
            key_passphrase: None,
            host_key_fingerprints: Vec::new(),
            dial_timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            direction: SyncDirection::LocalToRemote,
            local_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("remsync"),
            remote_root: ".".to_string(),
            poll_interval_ms: 1000,
            ignore: vec!["*.swp".to_string()],
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 500,
            operation_timeout_secs: 300,
            drain_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        if self.remote.host.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.host".into(),
                message: "must not be empty".into(),
            });
        }
        if self.remote.username.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.username".into(),
                message: "must not be empty".into(),
            });
        }
        positive(&mut errors, "remote.port", u64::from(self.remote.port));
        positive(&mut errors, "remote.dial_timeout_secs", self.remote.dial_timeout_secs);
        if self.remote.auth_method == AuthMethod::Key {
            // Tilde paths are expanded at runtime.
            if let Some(key) = &self.remote.key_file {
                if !key.to_string_lossy().starts_with('~') && !key.exists() {
                    errors.push(ValidationError {
                        field: "remote.key_file".into(),
                        message: format!("file does not exist: {}", key.display()),
                    });
                }
            }
        }

        // --- sync ---
        if self.sync.local_root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.local_root".into(),
                message: "must not be empty".into(),
            });
        } else {
            // Pulling creates a missing local root.
            let root_str = self.sync.local_root.to_string_lossy();
            if self.sync.direction == SyncDirection::LocalToRemote
                && !root_str.starts_with('~')
                && !self.sync.local_root.is_dir()
            {
                errors.push(ValidationError {
                    field: "sync.local_root".into(),
                    message: format!(
                        "directory does not exist: {}",
                        self.sync.local_root.display()
                    ),
                });
            }
        }
        if let Err(e) = RemotePath::new(&self.sync.remote_root) {
            errors.push(ValidationError {
                field: "sync.remote_root".into(),
                message: e.to_string(),
            });
        }
        positive(&mut errors, "sync.poll_interval_ms", self.sync.poll_interval_ms);
        for pattern in &self.sync.ignore {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ValidationError {
                    field: "sync.ignore".into(),
                    message: format!("invalid pattern '{pattern}': {e}"),
                });
            }
        }

        // --- transfer ---
        positive(&mut errors, "transfer.workers", self.transfer.workers as u64);
        positive(
            &mut errors,
            "transfer.queue_capacity",
            self.transfer.queue_capacity as u64,
        );
        positive(
            &mut errors,
            "transfer.max_retries",
            u64::from(self.transfer.max_retries),
        );
        positive(
            &mut errors,
            "transfer.operation_timeout_secs",
            self.transfer.operation_timeout_secs,
        );

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Conversion into a session configuration
// ---------------------------------------------------------------------------

/// Replaces a leading `~` with the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Default private key used by key-pair authentication.
pub fn default_key_file() -> PathBuf {
    expand_tilde(Path::new("~/.ssh/id_rsa"))
}

impl Config {
    /// Keyring account name for the configured remote (`user@host`).
    pub fn keyring_user(&self) -> String {
        format!("{}@{}", self.remote.username, self.remote.host)
    }

    /// Produce the immutable [`SessionConfig`] for a sync session.
    ///
    /// `password` overrides `remote.password`, typically after a keyring
    /// lookup. Password authentication without any password is an error.
    pub fn to_session_config(
        &self,
        password: Option<String>,
    ) -> Result<SessionConfig, DomainError> {
        let credentials = match self.remote.auth_method {
            AuthMethod::Password => {
                let password = password
                    .or_else(|| self.remote.password.clone())
                    .ok_or_else(|| {
                        DomainError::ValidationFailed(format!(
                            "no password configured for {}",
                            self.keyring_user()
                        ))
                    })?;
                Credentials::Password(password)
            }
            AuthMethod::Key => Credentials::KeyPair {
                private_key: self
                    .remote
                    .key_file
                    .as_deref()
                    .map(expand_tilde)
                    .unwrap_or_else(default_key_file),
                passphrase: self.remote.key_passphrase.clone(),
            },
        };

        let mut session = SessionConfig::new(
            RemoteEndpoint::new(&self.remote.host, self.remote.port, &self.remote.username),
            credentials,
            self.sync.direction,
            expand_tilde(&self.sync.local_root),
            RemotePath::new(&self.sync.remote_root)?,
        );
        session.workers = self.transfer.workers;
        session.queue_capacity = self.transfer.queue_capacity;
        session.max_retries = self.transfer.max_retries;
        session.retry_delay = Duration::from_millis(self.transfer.retry_delay_ms);
        session.operation_timeout = Duration::from_secs(self.transfer.operation_timeout_secs);
        session.drain_timeout = Duration::from_secs(self.transfer.drain_timeout_secs);
        session.poll_interval = Duration::from_millis(self.sync.poll_interval_ms);
        session.dial_timeout = Duration::from_secs(self.remote.dial_timeout_secs);
        session.ignore = self.sync.ignore.clone();
        session.host_key_fingerprints = self.remote.host_key_fingerprints.clone();
        session.validate()?;
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use remsync_core::config::ConfigBuilder;
/// use remsync_core::domain::SyncDirection;
///
/// let config = ConfigBuilder::new()
///     .remote_host("sftp.example.com")
///     .remote_username("alice")
///     .sync_direction(SyncDirection::RemoteToLocal)
///     .sync_remote_root("/home/alice/upload")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_host(mut self, host: impl Into<String>) -> Self {
        self.config.remote.host = host.into();
        self
    }

    pub fn remote_port(mut self, port: u16) -> Self {
        self.config.remote.port = port;
        self
    }

    pub fn remote_username(mut self, username: impl Into<String>) -> Self {
        self.config.remote.username = username.into();
        self
    }

    pub fn remote_password(mut self, password: impl Into<String>) -> Self {
        self.config.remote.password = Some(password.into());
        self
    }

    pub fn remote_key_file(mut self, key_file: PathBuf) -> Self {
        self.config.remote.auth_method = AuthMethod::Key;
        self.config.remote.key_file = Some(key_file);
        self
    }

    pub fn remote_auth_method(mut self, method: AuthMethod) -> Self {
        self.config.remote.auth_method = method;
        self
    }

    pub fn remote_host_key_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.config.remote.host_key_fingerprints.push(fingerprint.into());
        self
    }

    pub fn remote_dial_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.dial_timeout_secs = secs;
        self
    }

    // --- sync ---

    pub fn sync_direction(mut self, direction: SyncDirection) -> Self {
        self.config.sync.direction = direction;
        self
    }

    pub fn sync_local_root(mut self, root: PathBuf) -> Self {
        self.config.sync.local_root = root;
        self
    }

    pub fn sync_remote_root(mut self, root: impl Into<String>) -> Self {
        self.config.sync.remote_root = root.into();
        self
    }

    pub fn sync_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.sync.poll_interval_ms = ms;
        self
    }

    pub fn sync_ignore(mut self, patterns: Vec<String>) -> Self {
        self.config.sync.ignore = patterns;
        self
    }

    // --- transfer ---

    pub fn transfer_workers(mut self, n: usize) -> Self {
        self.config.transfer.workers = n;
        self
    }

    pub fn transfer_queue_capacity(mut self, n: usize) -> Self {
        self.config.transfer.queue_capacity = n;
        self
    }

    pub fn transfer_max_retries(mut self, n: u32) -> Self {
        self.config.transfer.max_retries = n;
        self
    }

    pub fn transfer_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.transfer.retry_delay_ms = ms;
        self
    }

    pub fn transfer_operation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transfer.operation_timeout_secs = secs;
        self
    }

    pub fn transfer_drain_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transfer.drain_timeout_secs = secs;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
