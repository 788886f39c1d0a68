//! Dependency entries read from the build tool's report.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name suffixes the build tool produces rather than reads.
pub const GENERATED_SUFFIXES: &[&str] = &[".bbl", "-eps-converted-to.pdf"];

/// Whether the build read or wrote a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Source,
    Generated,
}

/// One line of the dependency report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Path as reported: absolute, or relative to the project root.
    pub path: PathBuf,
    pub kind: DependencyKind,
}

impl DependencyEntry {
    pub fn source(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: DependencyKind::Source,
        }
    }

    pub fn generated(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: DependencyKind::Generated,
        }
    }

    /// Build an entry from the "read" section, recognising build products by name.
    pub fn from_read_section(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_generated_name(&path) {
            Self::generated(path)
        } else {
            Self::source(path)
        }
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn is_generated(&self) -> bool {
        self.kind == DependencyKind::Generated
    }
}

/// Check whether a file name looks like a build product.
pub fn is_generated_name(path: &Path) -> bool {
    let name = path.to_string_lossy();
    GENERATED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// The parsed dependency report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    /// Where the report was read from.
    pub report_path: PathBuf,
    /// Main source file, e.g. `paper.tex`.
    pub source_file: String,
    /// `source_file` without its extension.
    pub base_name: String,
    /// The written target, e.g. `paper.pdf`.
    pub output_file: String,
    /// `output_file` without its extension.
    pub jobname: String,
    /// Entries in report order.
    pub entries: Vec<DependencyEntry>,
}

impl DependencyReport {
    pub fn sources(&self) -> impl Iterator<Item = &DependencyEntry> {
        self.entries.iter().filter(|e| !e.is_generated())
    }

    pub fn generated(&self) -> impl Iterator<Item = &DependencyEntry> {
        self.entries.iter().filter(|e| e.is_generated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_section_recognises_build_products() {
        assert!(DependencyEntry::from_read_section("paper.bbl").is_generated());
        assert!(DependencyEntry::from_read_section("fig/a-eps-converted-to.pdf").is_generated());
        assert!(!DependencyEntry::from_read_section("fig/a.pdf").is_generated());
        assert!(!DependencyEntry::from_read_section("paper.tex").is_generated());
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(
            DependencyEntry::source("fig/PLOT.EPS").extension().as_deref(),
            Some("eps")
        );
        assert_eq!(DependencyEntry::source("Makefile").extension(), None);
    }
}
