//! Immutable per-session configuration
//!
//! A [`SessionConfig`] is produced once from the user-facing
//! [`crate::config::Config`] and shared read-only by every component of a
//! sync session.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::direction::SyncDirection;
use super::errors::DomainError;
use super::paths::{normalize_local, RemotePath};

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Network location and login name of the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl RemoteEndpoint {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
        }
    }

    /// `user@host:port`, used in log fields and keyring lookups
    pub fn display_name(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Authentication material for the remote side
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password(String),
    KeyPair {
        private_key: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(<redacted>)"),
            Credentials::KeyPair {
                private_key,
                passphrase,
            } => f
                .debug_struct("KeyPair")
                .field("private_key", private_key)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Everything a sync session needs, fixed at construction
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: RemoteEndpoint,
    pub credentials: Credentials,
    pub direction: SyncDirection,
    pub local_root: PathBuf,
    pub remote_root: RemotePath,
    /// Number of concurrent workers
    pub workers: usize,
    /// Bound of the task queue
    pub queue_capacity: usize,
    /// Total attempts per transfer operation
    pub max_retries: u32,
    /// Delay before the second attempt, doubled for each further attempt
    pub retry_delay: Duration,
    /// Deadline for a single attempt of a remote operation
    pub operation_timeout: Duration,
    /// Cadence of the remote poll loop
    pub poll_interval: Duration,
    pub dial_timeout: Duration,
    /// How long `stop` waits for in-flight tasks
    pub drain_timeout: Duration,
    /// Glob patterns of entries never synchronized
    pub ignore: Vec<String>,
    /// Accepted SHA-256 host key fingerprints, empty accepts any key
    pub host_key_fingerprints: Vec<String>,
}

impl SessionConfig {
    /// Creates a configuration with default tuning values
    pub fn new(
        endpoint: RemoteEndpoint,
        credentials: Credentials,
        direction: SyncDirection,
        local_root: impl Into<PathBuf>,
        remote_root: RemotePath,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            direction,
            local_root: local_root.into(),
            remote_root,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            ignore: vec!["*.swp".to_string()],
            host_key_fingerprints: Vec::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_ignore(mut self, patterns: Vec<String>) -> Self {
        self.ignore = patterns;
        self
    }

    /// Checks the invariants the engine relies on
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.workers == 0 {
            return Err(DomainError::ValidationFailed(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(DomainError::ValidationFailed(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(DomainError::ValidationFailed(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(DomainError::ValidationFailed(
                "poll interval must be positive".to_string(),
            ));
        }
        normalize_local(&self.local_root).map(|_| ())
    }
}
