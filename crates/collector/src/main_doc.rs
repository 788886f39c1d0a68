//! Choosing the main document of a project.

use arxiv_collector_common::{Error, Result};
use std::path::Path;

/// Names preferred when several `.tex` files sit in the project root.
pub const PREFERRED_NAMES: &[&str] = &["main", "paper"];

/// Resolve the main document's base name, honouring an explicit choice.
pub fn resolve_main_document(root: &Path, explicit: Option<&str>) -> Result<String> {
    match explicit {
        Some(name) => normalize_base_name(name),
        None => detect_main_document(root),
    }
}

/// Strip `.tex` and reject names the build cannot take as a job name.
pub fn normalize_base_name(name: &str) -> Result<String> {
    let base = name.strip_suffix(".tex").unwrap_or(name);
    if base.contains('/') || base.contains('\\') {
        return Err(Error::Config(format!(
            "main document ({:?}) must be in the project root; cd into the directory first",
            name
        )));
    }
    if base.contains('.') {
        return Err(Error::Config(format!(
            "main document name ({:?}) shouldn't contain '.'",
            base
        )));
    }
    if base.is_empty() {
        return Err(Error::Config("main document name is empty".to_string()));
    }
    Ok(base.to_string())
}

/// Guess the main document from the `.tex` files in `root`.
pub fn detect_main_document(root: &Path) -> Result<String> {
    let mut candidates: Vec<String> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            e.file_name()
                .to_str()
                .and_then(|n| n.strip_suffix(".tex"))
                .map(|s| s.to_string())
        })
        .collect();
    candidates.sort();

    if candidates.len() > 1 {
        let preferred: Vec<String> = candidates
            .iter()
            .filter(|c| PREFERRED_NAMES.contains(&c.as_str()))
            .cloned()
            .collect();
        if preferred.len() == 1 {
            return Ok(preferred[0].clone());
        }
    }

    match candidates.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(Error::AmbiguousMainDocument { candidates }),
    }
}
