//! Classified dependency files.

use crate::dependency::DependencyKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a dependency lives and whether it ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Inside the project root.
    Project,
    /// Outside the project, but bundled so the remote build uses our copy.
    BundledPackage,
    /// Outside the project and assumed to exist remotely.
    ExcludedSystem,
}

impl Origin {
    pub fn is_archived(&self) -> bool {
        !matches!(self, Origin::ExcludedSystem)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Project => write!(f, "project"),
            Origin::BundledPackage => write!(f, "bundled package"),
            Origin::ExcludedSystem => write!(f, "excluded system file"),
        }
    }
}

/// A dependency after path resolution and classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFile {
    /// Path as reported by the build tool.
    pub path: PathBuf,
    /// Final location after following symlinks; content is read from here.
    pub real_path: PathBuf,
    pub origin: Origin,
    pub kind: DependencyKind,
    /// Project-root-relative path inside the archive.
    pub canonical_relative_path: String,
    /// The package this file was bundled for, if any.
    pub package: Option<String>,
    /// Whether `real_path` sits under a recognised TeX installation tree.
    pub in_system_tree: bool,
}

impl ClassifiedFile {
    /// Lowercased extension of the reported path.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Whether a "bundle if used" package appeared among the dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUsage {
    pub package_name: String,
    pub used: bool,
}
