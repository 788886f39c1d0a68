//! Main sanitizer implementation.

use crate::environments::VerbatimSyntax;
use crate::scanner::Scanner;
use std::path::Path;
use tracing::{debug, trace};

/// Configuration for the sanitizer.
#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    /// Strip comments at all; when false, content passes through byte for byte.
    pub strip_comments: bool,
    /// Verbatim-style environments beyond the built-in list.
    pub extra_environments: Vec<String>,
    /// Inline verbatim commands beyond `\verb` and `\lstinline`.
    pub extra_inline_commands: Vec<String>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            strip_comments: true,
            extra_environments: Vec::new(),
            extra_inline_commands: Vec::new(),
        }
    }
}

/// What happened to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Comments were stripped (possibly none were found).
    Stripped,
    /// Sanitization is turned off.
    Disabled,
    /// The scanner gave up; content is the unmodified original.
    Degraded { reason: String },
}

/// Result of sanitization.
#[derive(Debug)]
pub struct SanitizeResult {
    /// The bytes to archive.
    pub content: Vec<u8>,
    pub outcome: Outcome,
    pub stats: SanitizeStats,
}

impl SanitizeResult {
    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, Outcome::Degraded { .. })
    }
}

/// Statistics about sanitization performed.
#[derive(Debug, Default, Clone)]
pub struct SanitizeStats {
    pub files: usize,
    pub comments_stripped: usize,
    pub bytes_removed: usize,
    pub verbatim_regions: usize,
    pub inline_verbatim: usize,
    pub degraded_files: usize,
}

impl SanitizeStats {
    /// Merge with another stats.
    pub fn merge(&mut self, other: &SanitizeStats) {
        self.files += other.files;
        self.comments_stripped += other.comments_stripped;
        self.bytes_removed += other.bytes_removed;
        self.verbatim_regions += other.verbatim_regions;
        self.inline_verbatim += other.inline_verbatim;
        self.degraded_files += other.degraded_files;
    }
}

/// The main sanitizer.
pub struct Sanitizer {
    config: SanitizerConfig,
    syntax: VerbatimSyntax,
}

impl Sanitizer {
    /// Create a new sanitizer with default configuration.
    pub fn new() -> Self {
        Self::with_config(SanitizerConfig::default())
    }

    /// Create a new sanitizer with custom configuration.
    pub fn with_config(config: SanitizerConfig) -> Self {
        let syntax =
            VerbatimSyntax::with_extra(&config.extra_environments, &config.extra_inline_commands);
        Self { config, syntax }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.strip_comments
    }

    /// Sanitize raw file content.
    pub fn sanitize(&self, content: &[u8]) -> SanitizeResult {
        let mut stats = SanitizeStats {
            files: 1,
            ..Default::default()
        };

        if !self.config.strip_comments {
            return SanitizeResult {
                content: content.to_vec(),
                outcome: Outcome::Disabled,
                stats,
            };
        }

        let text = match std::str::from_utf8(content) {
            Ok(text) => text,
            Err(e) => {
                return self.degrade(content, format!("not valid UTF-8: {}", e), stats);
            }
        };

        match Scanner::new(&self.syntax).scan(text) {
            Ok((stripped, counts)) => {
                stats.comments_stripped = counts.comments;
                stats.bytes_removed = counts.bytes_removed;
                stats.verbatim_regions = counts.verbatim_regions;
                stats.inline_verbatim = counts.inline_verbatim;
                trace!(
                    "Stripped {} comments ({} bytes)",
                    counts.comments,
                    counts.bytes_removed
                );
                SanitizeResult {
                    content: stripped.into_bytes(),
                    outcome: Outcome::Stripped,
                    stats,
                }
            }
            Err(e) => self.degrade(content, e.to_string(), stats),
        }
    }

    /// Read and sanitize a file. The file itself is never modified.
    pub fn sanitize_file(&self, path: &Path) -> std::io::Result<SanitizeResult> {
        let content = std::fs::read(path)?;
        let result = self.sanitize(&content);
        if let Outcome::Degraded { reason } = &result.outcome {
            debug!(
                "Leaving {} unmodified, comment stripping gave up: {}",
                path.display(),
                reason
            );
        }
        Ok(result)
    }

    fn degrade(&self, content: &[u8], reason: String, mut stats: SanitizeStats) -> SanitizeResult {
        stats.degraded_files = 1;
        SanitizeResult {
            content: content.to_vec(),
            outcome: Outcome::Degraded { reason },
            stats,
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}
