//! Units of work submitted to the worker pool

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::paths::RelativePath;

/// The kind of change a task propagates to the target side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Entry appeared on the authoritative side
    Create,
    /// File content changed on the authoritative side
    Write,
    /// Entry disappeared from the authoritative side
    Remove,
    /// Entry moved from `previous` to `path`
    Rename,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Create => "create",
            TaskKind::Write => "write",
            TaskKind::Remove => "remove",
            TaskKind::Rename => "rename",
        }
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file event to be applied to the target side
///
/// Paths are relative to the sync roots, so the same task is meaningful in
/// both directions. Each task is consumed exactly once by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub path: RelativePath,
    /// Source path of a rename
    pub previous: Option<RelativePath>,
}

impl Task {
    fn with_kind(kind: TaskKind, path: RelativePath) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            path,
            previous: None,
        }
    }

    pub fn create(path: RelativePath) -> Self {
        Self::with_kind(TaskKind::Create, path)
    }

    pub fn write(path: RelativePath) -> Self {
        Self::with_kind(TaskKind::Write, path)
    }

    pub fn remove(path: RelativePath) -> Self {
        Self::with_kind(TaskKind::Remove, path)
    }

    pub fn rename(from: RelativePath, to: RelativePath) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TaskKind::Rename,
            path: to,
            previous: Some(from),
        }
    }

    /// Every path this task touches, sorted and deduplicated
    ///
    /// Used to acquire per-path locks in a consistent order.
    pub fn touched_paths(&self) -> Vec<&RelativePath> {
        let mut paths = vec![&self.path];
        if let Some(prev) = &self.previous {
            if prev != &self.path {
                paths.push(prev);
            }
        }
        paths.sort();
        paths
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.previous {
            Some(prev) => write!(f, "{} {} -> {}", self.kind, prev, self.path),
            None => write!(f, "{} {}", self.kind, self.path),
        }
    }
}
