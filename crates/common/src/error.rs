//! Common error types for arxiv-collector.

use std::path::PathBuf;
use thiserror::Error;

/// Common error type for collection runs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("deps file {} seems broken: {reason}", report.display())]
    MalformedDependencyReport { report: PathBuf, reason: String },

    #[error("Link cycle detected for {}", path.display())]
    SymlinkCycle { path: PathBuf },

    #[error(
        "{package} is used, but the generated file '{}' is missing; re-run the build",
        path.display()
    )]
    MissingGeneratedOutput { package: String, path: PathBuf },

    #[error("Can't guess the main document among [{}]; pass it explicitly", candidates.join(", "))]
    AmbiguousMainDocument { candidates: Vec<String> },

    #[error("Two entries would be archived as '{path}'")]
    DuplicateArchivePath { path: String },

    #[error("Refusing to archive unsafe path '{path}'")]
    UnsafeArchivePath { path: String },

    #[error("{tool} failed: {reason}")]
    OptionalToolFailure { tool: String, reason: String },

    #[error("Build failed with code {code:?}\nCalled {command}\n\nOutput was:\n{output}")]
    BuildFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error(
        "Your latexmk version ({version}) has broken dependency tracking, so it won't work for us"
    )]
    IncompatibleBuildTool { version: String },

    #[error("Could not find executable '{0}'")]
    ToolNotFound(String),

    #[error("'{}' doesn't exist!", path.display())]
    MissingFile { path: PathBuf },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a run may continue after this error (with degraded output).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::OptionalToolFailure { .. })
    }
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;
