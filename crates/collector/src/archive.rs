//! Deterministic archive reading and writing.

use arxiv_collector_common::hash::sha256_file;
use arxiv_collector_common::{Error, Result};
use arxiv_collector_manifest::{validate_manifest, ArchiveManifest};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// 2024-01-01 00:00:00 UTC, used when `SOURCE_DATE_EPOCH` is unset.
pub const DEFAULT_MTIME: u64 = 1704067200;

/// Knobs for the archive writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Modification time stamped on every entry.
    pub mtime: u64,
}

impl ArchiveOptions {
    /// Take the entry timestamp from `SOURCE_DATE_EPOCH`, else the fixed default.
    pub fn from_env() -> Self {
        let mtime = std::env::var("SOURCE_DATE_EPOCH")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MTIME);
        Self { mtime }
    }
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            mtime: DEFAULT_MTIME,
        }
    }
}

/// What was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub file_count: usize,
    /// Sum of entry sizes before compression.
    pub total_bytes: u64,
    /// Size of the archive file.
    pub compressed_bytes: u64,
    pub sha256: String,
}

/// Write the manifest to `dest` as a gzip-compressed tarball.
///
/// Entries go out in lexical order with normalized headers, so unchanged
/// inputs give byte-identical archives. The archive is staged next to `dest`
/// and only renamed into place once every entry has been written.
pub fn write_archive(
    manifest: &ArchiveManifest,
    dest: &Path,
    options: &ArchiveOptions,
) -> Result<ArchiveSummary> {
    validate_manifest(manifest)?;

    let mut entries: Vec<_> = manifest.entries().iter().collect();
    entries.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(parent)?;

    let mut total_bytes = 0u64;
    {
        // GzEncoder writes mtime 0 and no file name into the gzip header.
        let encoder = GzEncoder::new(&mut staged, Compression::default());
        let mut archive = Builder::new(encoder);

        for entry in &entries {
            let content = entry.source.read()?;
            debug!("Adding {}", entry.archive_path);
            total_bytes += content.len() as u64;
            add_file_to_archive(&mut archive, &entry.archive_path, &content, options.mtime)?;
        }

        let encoder = archive.into_inner()?;
        encoder.finish()?.flush()?;
    }

    // Temporary files are created 0600; the archive is meant to be shared.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    staged.persist(dest).map_err(|e| Error::Io(e.error))?;

    let compressed_bytes = std::fs::metadata(dest)?.len();
    let sha256 = sha256_file(dest)?;
    info!("Archive written to {}", dest.display());
    debug!("sha256 {}", sha256);

    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        file_count: entries.len(),
        total_bytes,
        compressed_bytes,
        sha256,
    })
}

fn add_file_to_archive<W: Write>(
    archive: &mut Builder<W>,
    path: &str,
    content: &[u8],
    mtime: u64,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(mtime);
    header.set_cksum();

    archive.append_data(&mut header, path, content)?;
    Ok(())
}

/// Read an archive back into a map from member path to contents.
pub fn read_archive(path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingFile {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut members = BTreeMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().to_string();
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        members.insert(name, content);
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arxiv_collector_manifest::{ByteSource, ManifestEntry};
    use std::fs;
    use tempfile::tempdir;

    fn sanitized(name: &str, content: &str) -> ByteSource {
        ByteSource::Sanitized {
            path: PathBuf::from(name),
            content: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_write_read_archive() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("plot.pdf"), b"%PDF-1.5").unwrap();
        let mut manifest = ArchiveManifest::new();
        manifest.push("paper.tex", sanitized("paper.tex", "hi %\n")).unwrap();
        manifest
            .push(
                "fig/plot.pdf",
                ByteSource::Original {
                    path: dir.path().join("plot.pdf"),
                },
            )
            .unwrap();
        manifest.finalize();

        let dest = dir.path().join("out.tar.gz");
        let summary = write_archive(&manifest, &dest, &ArchiveOptions::default()).unwrap();
        assert_eq!(summary.file_count, 2);
        assert_eq!(summary.total_bytes, 13);
        assert_eq!(summary.sha256.len(), 64);

        let members = read_archive(&dest).unwrap();
        assert_eq!(
            members.keys().collect::<Vec<_>>(),
            vec!["fig/plot.pdf", "paper.tex"]
        );
        assert_eq!(members["paper.tex"], b"hi %\n".to_vec());
    }

    #[test]
    fn test_output_is_byte_identical() {
        let dir = tempdir().unwrap();
        let mut manifest = ArchiveManifest::new();
        manifest.push("b.tex", sanitized("b.tex", "b")).unwrap();
        manifest.push("a.tex", sanitized("a.tex", "a")).unwrap();
        manifest.finalize();

        let first = dir.path().join("first.tar.gz");
        let second = dir.path().join("second.tar.gz");
        let options = ArchiveOptions { mtime: 42 };
        write_archive(&manifest, &first, &options).unwrap();
        write_archive(&manifest, &second, &options).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_archive_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let mut manifest = ArchiveManifest::new();
        manifest.push("paper.tex", sanitized("paper.tex", "hi")).unwrap();
        manifest.finalize();

        let dest = dir.path().join("arxiv.tar.gz");
        write_archive(&manifest, &dest, &ArchiveOptions::default()).unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_entries_are_written_sorted() {
        let dir = tempdir().unwrap();
        // Unfinalized, insertion order is not lexical.
        let mut manifest = ArchiveManifest::new();
        manifest.push("z.tex", sanitized("z.tex", "z")).unwrap();
        manifest.push("a.tex", sanitized("a.tex", "a")).unwrap();

        let dest = dir.path().join("out.tar.gz");
        write_archive(&manifest, &dest, &ArchiveOptions::default()).unwrap();

        let file = File::open(&dest).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.tex", "z.tex"]);
    }

    #[test]
    fn test_headers_are_normalized() {
        let dir = tempdir().unwrap();
        let mut manifest = ArchiveManifest::new();
        manifest.push("a.tex", sanitized("a.tex", "a")).unwrap();
        let dest = dir.path().join("out.tar.gz");
        write_archive(&manifest, &dest, &ArchiveOptions { mtime: 7 }).unwrap();

        let file = File::open(&dest).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.mode().unwrap(), 0o644);
            assert_eq!(header.uid().unwrap(), 0);
            assert_eq!(header.gid().unwrap(), 0);
            assert_eq!(header.mtime().unwrap(), 7);
        }
    }

    #[test]
    fn test_failure_leaves_no_archive() {
        let dir = tempdir().unwrap();
        let mut manifest = ArchiveManifest::new();
        manifest.push("a.tex", sanitized("a.tex", "a")).unwrap();
        manifest
            .push(
                "gone.pdf",
                ByteSource::Original {
                    path: dir.path().join("gone.pdf"),
                },
            )
            .unwrap();

        let dest = dir.path().join("out.tar.gz");
        let err = write_archive(&manifest, &dest, &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingFile { .. }));
        assert!(!dest.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_collision_caught_at_build_time() {
        let dir = tempdir().unwrap();
        let manifest: ArchiveManifest = vec![
            ManifestEntry {
                archive_path: "a.tex".to_string(),
                source: sanitized("a.tex", "1"),
            },
            ManifestEntry {
                archive_path: "a.tex".to_string(),
                source: sanitized("other/a.tex", "2"),
            },
        ]
        .into_iter()
        .collect();

        let dest = dir.path().join("out.tar.gz");
        let err = write_archive(&manifest, &dest, &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateArchivePath { .. }));
        assert!(!dest.exists());
    }
}
