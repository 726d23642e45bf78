//! Ignore patterns
//!
//! A path is ignored when a pattern matches either its file name or the
//! whole relative path. Ignoring a directory ignores its subtree since
//! walkers never descend into it.

use glob::{MatchOptions, Pattern};
use remsync_core::domain::{DomainError, RelativePath};

#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl IgnoreFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DomainError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| {
                    DomainError::ValidationFailed(format!(
                        "invalid ignore pattern '{}': {e}",
                        p.as_ref()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, path: &RelativePath) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        self.patterns.iter().any(|p| {
            p.matches_with(name, MATCH_OPTIONS) || p.matches_with(path.as_str(), MATCH_OPTIONS)
        })
    }
}
