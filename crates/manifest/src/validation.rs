//! Archive path and manifest validation.

use crate::manifest::ArchiveManifest;
use arxiv_collector_common::{Error, Result};
use std::collections::HashSet;

/// Normalize an archive path: strip `./` segments and duplicate slashes.
///
/// Absolute paths, empty paths and paths with `..` segments are rejected so
/// every member extracts inside the archive root.
pub fn normalize_archive_path(path: &str) -> Result<String> {
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(Error::UnsafeArchivePath {
            path: path.to_string(),
        });
    }

    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(Error::UnsafeArchivePath {
                    path: path.to_string(),
                })
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(Error::UnsafeArchivePath {
            path: path.to_string(),
        });
    }
    Ok(parts.join("/"))
}

/// Result of manifest validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Error>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: Error) {
        self.valid = false;
        self.errors.push(error);
    }

    /// Turn the first recorded error into a `Result`.
    pub fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Check every archive path is safe and unique.
pub fn check_manifest(manifest: &ArchiveManifest) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut seen: HashSet<String> = HashSet::new();

    for entry in manifest.entries() {
        match normalize_archive_path(&entry.archive_path) {
            Ok(normalized) => {
                if !seen.insert(normalized.clone()) {
                    result.add_error(Error::DuplicateArchivePath { path: normalized });
                }
            }
            Err(e) => result.add_error(e),
        }
    }

    result
}

/// Fail on the first unsafe or duplicated archive path.
pub fn validate_manifest(manifest: &ArchiveManifest) -> Result<()> {
    check_manifest(manifest).into_result()
}
