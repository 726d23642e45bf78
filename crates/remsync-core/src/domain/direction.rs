//! Sync direction
//!
//! A session mirrors exactly one way. The direction decides which tree is
//! authoritative (its changes produce tasks) and which tree is written to.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Direction of a synchronization session, fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// The local tree is authoritative; changes are uploaded
    LocalToRemote,
    /// The remote tree is authoritative; changes are downloaded
    RemoteToLocal,
}

impl SyncDirection {
    /// Returns true when local changes drive the session
    pub fn is_push(&self) -> bool {
        matches!(self, SyncDirection::LocalToRemote)
    }

    /// Short verb used in log messages for a transfer in this direction
    pub fn transfer_verb(&self) -> &'static str {
        match self {
            SyncDirection::LocalToRemote => "upload",
            SyncDirection::RemoteToLocal => "download",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::LocalToRemote => "local_to_remote",
            SyncDirection::RemoteToLocal => "remote_to_local",
        }
    }
}

impl Display for SyncDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local_to_remote" | "push" | "upload" => Ok(SyncDirection::LocalToRemote),
            "remote_to_local" | "pull" | "download" => Ok(SyncDirection::RemoteToLocal),
            other => Err(DomainError::InvalidDirection(other.to_string())),
        }
    }
}
