//! The archive manifest: what goes into the archive, and from where.

use crate::validation::normalize_archive_path;
use arxiv_collector_common::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// Where an entry's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ByteSource {
    /// Read the file on disk as is.
    Original { path: PathBuf },
    /// Use a sanitized copy of `path` held in memory.
    Sanitized {
        path: PathBuf,
        #[serde(skip)]
        content: Vec<u8>,
    },
    /// A generated file shipped in place of its inputs.
    SubstituteFile { path: PathBuf },
    /// Generated bytes produced during this run, e.g. by an external tool.
    SubstituteBytes {
        producer: String,
        #[serde(skip)]
        content: Vec<u8>,
    },
}

impl ByteSource {
    /// Read the bytes this source stands for.
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            ByteSource::Original { path } | ByteSource::SubstituteFile { path } => {
                std::fs::read(path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Error::MissingFile { path: path.clone() },
                    _ => Error::Io(e),
                })
            }
            ByteSource::Sanitized { content, .. } | ByteSource::SubstituteBytes { content, .. } => {
                Ok(content.clone())
            }
        }
    }
}

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Project-root-relative path inside the archive.
    pub archive_path: String,
    pub source: ByteSource,
}

/// Ordered, collision-free list of archive members.
///
/// Entries are pushed while the pipeline runs and sorted once by
/// [`ArchiveManifest::finalize`]; the archive builder walks them in that order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveManifest {
    entries: Vec<ManifestEntry>,
    #[serde(skip)]
    seen: HashSet<String>,
    #[serde(skip)]
    finalized: bool,
}

impl ArchiveManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A path already present is an error, never an overwrite.
    pub fn push(&mut self, archive_path: &str, source: ByteSource) -> Result<()> {
        if self.finalized {
            return Err(Error::Config(format!(
                "manifest already finalized; cannot add '{}'",
                archive_path
            )));
        }
        let archive_path = normalize_archive_path(archive_path)?;
        if !self.seen.insert(archive_path.clone()) {
            return Err(Error::DuplicateArchivePath { path: archive_path });
        }
        self.entries.push(ManifestEntry {
            archive_path,
            source,
        });
        Ok(())
    }

    /// Sort entries lexically by archive path and freeze the manifest.
    pub fn finalize(&mut self) {
        self.entries
            .sort_by(|a, b| a.archive_path.cmp(&b.archive_path));
        self.finalized = true;
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive paths in current order.
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.archive_path.as_str()).collect()
    }

    /// Pretty JSON listing of the manifest, without in-memory contents.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collect entries as given, without the uniqueness check; the archive
/// builder still validates before writing.
impl FromIterator<ManifestEntry> for ArchiveManifest {
    fn from_iter<I: IntoIterator<Item = ManifestEntry>>(iter: I) -> Self {
        let entries: Vec<ManifestEntry> = iter.into_iter().collect();
        let seen = entries.iter().map(|e| e.archive_path.clone()).collect();
        Self {
            entries,
            seen,
            finalized: false,
        }
    }
}
