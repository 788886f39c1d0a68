//! User-configured path patterns.

use arxiv_collector_common::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// A set of glob patterns tested against a path or the names along it.
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: GlobSet,
    len: usize,
}

impl PatternSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        Ok(Self {
            set: build_globset(patterns)?,
            len: patterns.len(),
        })
    }

    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the whole path or any single component matches.
    pub fn matches(&self, path: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.set.is_match(path) {
            return true;
        }
        path.components()
            .any(|c| self.set.is_match(Path::new(c.as_os_str())))
    }

    /// Whether the name of the file's immediate parent directory matches.
    pub fn matches_directory(&self, path: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        path.parent()
            .and_then(Path::file_name)
            .map(|name| self.set.is_match(Path::new(name)))
            .unwrap_or(false)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::InvalidPattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}
