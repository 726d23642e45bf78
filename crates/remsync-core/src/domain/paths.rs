//! Path types
//!
//! Every path the engine moves between the two trees goes through a
//! [`RelativePath`]: the authoritative-side path has its root stripped, and
//! the counterpart is produced by joining the relative path onto the other
//! root. Both steps are lexical and exact, so
//! `translate(translate(p, A->B), B->A) == p` for any `p` under root `A`.
//!
//! - [`RelativePath`] - `/`-separated segments below a root (empty = the root)
//! - [`RemotePath`] - normalized POSIX path in the remote namespace

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RelativePath
// ============================================================================

/// A normalized path relative to a sync root
///
/// Segments are joined with `/` regardless of platform. The empty path
/// designates the root itself. `.` segments are dropped, empty segments
/// (duplicate or trailing slashes) are collapsed and `..` is rejected, so a
/// `RelativePath` can never escape its root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// The root itself
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parses and normalizes a `/`-separated relative path
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` for absolute paths or paths
    /// containing `..`
    pub fn new(path: &str) -> Result<Self, DomainError> {
        if path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "relative path must not start with '/': {path}"
            )));
        }
        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(DomainError::InvalidPath(format!(
                        "relative path escapes its root: {path}"
                    )))
                }
                s => segments.push(s),
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// Computes the path of `path` relative to the local `root`
    ///
    /// Both paths are normalized lexically first (`.` dropped, `..`
    /// resolved), so `/a/./b/../c` under `/a` yields `c`. The filesystem is
    /// never consulted.
    ///
    /// # Errors
    /// - `DomainError::PathNotInRoot` if `path` is not below `root`
    /// - `DomainError::InvalidPath` if a component is not valid UTF-8
    pub fn from_local(root: &Path, path: &Path) -> Result<Self, DomainError> {
        let root = normalize_local(root)?;
        let path = normalize_local(path)?;
        let rest = path.strip_prefix(&root).map_err(|_| {
            DomainError::PathNotInRoot(format!(
                "{} is not within {}",
                path.display(),
                root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(c) => {
                    let s = c.to_str().ok_or_else(|| {
                        DomainError::InvalidPath(format!(
                            "non UTF-8 path component in {}",
                            path.display()
                        ))
                    })?;
                    segments.push(s);
                }
                Component::CurDir => {}
                other => {
                    return Err(DomainError::InvalidPath(format!(
                        "unexpected component {other:?} in {}",
                        path.display()
                    )))
                }
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// Resolves this relative path below a local root
    pub fn to_local(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for segment in self.segments() {
            out.push(segment);
        }
        out
    }

    /// Appends a single name
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if `name` is empty, `.`, `..` or
    /// contains a `/`
    pub fn join(&self, name: &str) -> Result<Self, DomainError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(DomainError::InvalidPath(format!(
                "invalid path component: {name:?}"
            )));
        }
        if self.is_root() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, name)))
        }
    }

    /// Returns true for the root itself
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent directory, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Final segment, `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    /// Iterates over the segments from the root downwards
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Every proper ancestor from the top-most down to the parent
    ///
    /// The root is not included.
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(p) = current {
            if p.is_root() {
                break;
            }
            current = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}

/// Lexically normalizes a local path (drops `.`, resolves `..`)
pub(crate) fn normalize_local(path: &Path) -> Result<PathBuf, DomainError> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => normalized.push(p.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(DomainError::InvalidPath(format!(
                        "path escapes root via ..: {}",
                        path.display()
                    )));
                }
            }
            Component::Normal(c) => normalized.push(c),
        }
    }
    Ok(normalized)
}

// ============================================================================
// RemotePath
// ============================================================================

/// A normalized path in the remote namespace
///
/// Always `/`-separated. Absolute paths start with `/`; relative paths are
/// resolved by the server against the login directory. Trailing and
/// duplicate slashes are removed, `.` segments dropped and `..` rejected.
/// The empty relative path is spelled `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Parses and normalizes a remote path
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRemotePath` for an empty string or a
    /// path containing `..`
    pub fn new(path: &str) -> Result<Self, DomainError> {
        if path.is_empty() {
            return Err(DomainError::InvalidRemotePath(
                "remote path must not be empty".to_string(),
            ));
        }
        let absolute = path.starts_with('/');
        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(DomainError::InvalidRemotePath(format!(
                        "'..' is not allowed: {path}"
                    )))
                }
                s => segments.push(s),
            }
        }
        let joined = segments.join("/");
        let normalized = match (absolute, joined.is_empty()) {
            (true, _) => format!("/{joined}"),
            (false, true) => ".".to_string(),
            (false, false) => joined,
        };
        Ok(Self(normalized))
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty() && *s != ".")
    }

    /// Joins a relative path onto this one
    pub fn join_relative(&self, rel: &RelativePath) -> Self {
        if rel.is_root() {
            return self.clone();
        }
        let joined = match self.0.as_str() {
            "/" => format!("/{}", rel.as_str()),
            "." => rel.as_str().to_string(),
            base => format!("{}/{}", base, rel.as_str()),
        };
        Self(joined)
    }

    /// Computes the path of `self` relative to `root`
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInRoot` when `self` is not `root` or a
    /// descendant of it
    pub fn relative_to(&self, root: &RemotePath) -> Result<RelativePath, DomainError> {
        let not_in_root = || {
            DomainError::PathNotInRoot(format!("{} is not within {}", self.0, root.0))
        };
        if self.is_absolute() != root.is_absolute() {
            return Err(not_in_root());
        }
        let mut own = self.segments();
        for root_segment in root.segments() {
            match own.next() {
                Some(s) if s == root_segment => {}
                _ => return Err(not_in_root()),
            }
        }
        Ok(RelativePath(own.collect::<Vec<_>>().join("/")))
    }

    /// Parent directory, `None` for `/` and `.`
    pub fn parent(&self) -> Option<Self> {
        match self.0.as_str() {
            "/" | "." => None,
            s => match s.rfind('/') {
                Some(0) => Some(Self("/".to_string())),
                Some(idx) => Some(Self(s[..idx].to_string())),
                None => Some(Self(".".to_string())),
            },
        }
    }

    /// Final segment, `None` for `/` and `.`
    pub fn file_name(&self) -> Option<&str> {
        match self.0.as_str() {
            "/" | "." => None,
            s => s.rsplit('/').next(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<RemotePath> for String {
    fn from(value: RemotePath) -> Self {
        value.0
    }
}
