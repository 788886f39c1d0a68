//! Thin wrapper around latexmk: version check and the dependency-tracking build.

use crate::runner::{describe, CommandRunner};
use arxiv_collector_common::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Matches the banner printed by `latexmk --version`.
pub static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)Latexmk, John Collins, \d+ \w+\.? \d+\. Version (\S+)\s*$").unwrap()
});

/// Versions whose dependency tracking is broken.
pub const BROKEN_VERSIONS: &[&str] = &["4.63b", "4.64"];

/// Base name of the report file written by the build.
pub const DEFAULT_DEPS_FILE: &str = ".deps";

/// Ask latexmk for its version.
pub fn latexmk_version(runner: &dyn CommandRunner, latexmk: &Path, cwd: &Path) -> Result<String> {
    let args = vec!["--version".to_string()];
    let output = runner.run(latexmk, &args, cwd)?;
    let text = String::from_utf8_lossy(&output.stdout);
    VERSION_PATTERN
        .captures(&text)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            Error::Config(format!(
                "Bad output of {} --version:\n{}",
                latexmk.display(),
                text
            ))
        })
}

/// Reject latexmk versions known to write unusable reports.
pub fn check_version(version: &str) -> Result<()> {
    if BROKEN_VERSIONS.contains(&version) {
        return Err(Error::IncompatibleBuildTool {
            version: version.to_string(),
        });
    }
    Ok(())
}

/// A report path in `root` that does not exist yet.
pub fn fresh_deps_path(root: &Path) -> PathBuf {
    let mut candidate = root.join(DEFAULT_DEPS_FILE);
    while candidate.exists() {
        debug!("{} already exists...", candidate.display());
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        candidate = root.join(format!("{}-{}", DEFAULT_DEPS_FILE, &suffix[..8]));
    }
    candidate
}

/// Build the document and have latexmk write its dependency report.
///
/// latexmk runs inside `root`, so `deps_file` is passed relative to it.
pub fn build(
    runner: &dyn CommandRunner,
    latexmk: &Path,
    root: &Path,
    base_name: &str,
    deps_file: &Path,
) -> Result<()> {
    let deps_out = deps_file.strip_prefix(root).unwrap_or(deps_file);
    let args = vec![
        "-silent".to_string(),
        "-pdf".to_string(),
        "-deps".to_string(),
        format!("-deps-out={}", deps_out.display()),
        base_name.to_string(),
    ];
    info!("Building {}...", base_name);
    let output = runner.run(latexmk, &args, root)?;

    if !output.success() {
        return Err(Error::BuildFailed {
            command: describe(latexmk, &args),
            code: output.code,
            output: output.combined(),
        });
    }
    debug!("{}", output.combined());
    debug!("Dependencies in {}", deps_file.display());
    Ok(())
}
