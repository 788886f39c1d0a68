//! Parser for latexmk's `-deps` report.
//!
//! The report looks like:
//!
//! ```text
//! #===Dependents, and related info, for paper.tex:
//! paper.pdf :\
//!     paper.tex\
//!     /usr/share/texlive/texmf-dist/tex/latex/biblatex/biblatex.sty\
//! #===End dependents for paper.tex:
//! ```
//!
//! The target line names the file the build wrote; every continuation line
//! after it is a file the build read. Marker tokens differ between latexmk
//! versions, so anything unexpected fails instead of being guessed at.

use arxiv_collector_common::{Error, Result};
use arxiv_collector_manifest::{DependencyEntry, DependencyReport};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace};

pub static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#===Dependents(?:, and related info,)? for (.*):$").unwrap()
});

pub static TARGET_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*) :\\$").unwrap());

pub static END_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#===End dependents for (.*):$").unwrap());

pub static GENERATED_START_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#===Generated files for (.*):$").unwrap());

pub static GENERATED_END_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#===End generated files for (.*):$").unwrap());

/// Trailer some latexmk versions append after the end marker.
pub const END_OF_FILE: &str = "[end of file]";

const MARKER_PREFIX: &str = "#===";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Target,
    Dependents,
    Trailer,
    Generated,
}

/// Read and parse a report file.
pub fn parse_report(path: &Path) -> Result<DependencyReport> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingFile {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    parse_report_str(&text, path)
}

/// Parse report text; `report_path` is only used in messages.
pub fn parse_report_str(text: &str, report_path: &Path) -> Result<DependencyReport> {
    let broken = |reason: String| Error::MalformedDependencyReport {
        report: report_path.to_path_buf(),
        reason,
    };

    let mut section = Section::Preamble;
    let mut source_file = String::new();
    let mut base_name = String::new();
    let mut output_file = String::new();
    let mut entries: Vec<DependencyEntry> = Vec::new();
    let mut seen: HashSet<DependencyEntry> = HashSet::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let is_marker = trimmed.starts_with(MARKER_PREFIX);
        let is_comment = trimmed.starts_with('#') && !is_marker;

        match section {
            Section::Preamble => {
                if let Some(caps) = HEADER_PATTERN.captures(trimmed) {
                    source_file = caps[1].to_string();
                    base_name = strip_extension(&source_file);
                    section = Section::Target;
                } else if !is_comment {
                    return Err(broken(format!(
                        "confused by line\n{}\nExpected to start with '#===Dependents'",
                        line
                    )));
                }
            }
            Section::Target => {
                if let Some(caps) = TARGET_PATTERN.captures(trimmed) {
                    output_file = caps[1].trim().to_string();
                    section = Section::Dependents;
                } else if !is_comment {
                    return Err(broken(format!(
                        "confused by line\n{}\nExpected something like '{}.pdf :\\'",
                        line, base_name
                    )));
                }
            }
            Section::Dependents => {
                if is_marker {
                    match END_PATTERN.captures(trimmed) {
                        Some(caps) if caps[1] == source_file || caps[1] == base_name => {
                            section = Section::Trailer;
                        }
                        _ => {
                            return Err(broken(format!(
                                "expected the line\n{}\n  to be one of:\n#===End dependents for {}:\n#===End dependents for {}:",
                                line, source_file, base_name
                            )));
                        }
                    }
                } else if !is_comment {
                    let dep = dependency_path(trimmed);
                    if !dep.is_empty() {
                        let entry = DependencyEntry::from_read_section(dep);
                        trace!("Read dependency {:?}", entry);
                        if seen.insert(entry.clone()) {
                            entries.push(entry);
                        }
                    }
                }
            }
            Section::Trailer => {
                if GENERATED_START_PATTERN.is_match(trimmed) {
                    section = Section::Generated;
                } else if trimmed != END_OF_FILE && !is_comment {
                    return Err(broken(format!(
                        "expected the line\n{}\n  to be {}",
                        line, END_OF_FILE
                    )));
                }
            }
            Section::Generated => {
                if GENERATED_END_PATTERN.is_match(trimmed) {
                    section = Section::Trailer;
                } else if is_marker {
                    return Err(broken(format!("unrecognized marker\n{}", line)));
                } else if !is_comment {
                    let dep = dependency_path(trimmed);
                    if !dep.is_empty() {
                        let entry = DependencyEntry::generated(dep);
                        if seen.insert(entry.clone()) {
                            entries.push(entry);
                        }
                    }
                }
            }
        }
    }

    match section {
        Section::Preamble => {
            return Err(broken(
                "no '#===Dependents' header found; is the build tool compatible?".to_string(),
            ))
        }
        Section::Target => {
            return Err(broken(format!(
                "missing target line like '{}.pdf :\\'",
                base_name
            )))
        }
        Section::Dependents => {
            return Err(broken(format!(
                "hit end of file before '#===End dependents for {}:'",
                source_file
            )))
        }
        Section::Generated => {
            return Err(broken(
                "hit end of file inside the generated files section".to_string(),
            ))
        }
        Section::Trailer => {}
    }

    let jobname = strip_extension(&output_file);
    debug!(
        "Deps file {}: source {}, base name {}, output {}, jobname {}",
        report_path.display(),
        source_file,
        base_name,
        output_file,
        jobname
    );

    Ok(DependencyReport {
        report_path: report_path.to_path_buf(),
        source_file,
        base_name,
        output_file,
        jobname,
        entries,
    })
}

/// Strip the continuation backslash and surrounding whitespace.
fn dependency_path(line: &str) -> &str {
    line.strip_suffix('\\').unwrap_or(line).trim()
}

fn strip_extension(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| {
            let parent = Path::new(name).parent().filter(|p| !p.as_os_str().is_empty());
            match parent {
                Some(parent) => parent.join(stem).to_string_lossy().to_string(),
                None => stem.to_string_lossy().to_string(),
            }
        })
        .unwrap_or_else(|| name.to_string())
}
