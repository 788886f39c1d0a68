//! Path classification: project file, bundled package file, or excluded.

use crate::patterns::PatternSet;
use arxiv_collector_common::{Error, Result};
use arxiv_collector_manifest::{
    ClassifiedFile, DependencyEntry, Origin, PackageUsage, PolicyTable,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// More hops than any sane chain of links.
pub const MAX_LINK_HOPS: usize = 40;

/// Directory names that mark a TeX installation tree.
const SYSTEM_TREE_MARKERS: &[&str] = &["texlive", "miktex", "MiKTeX", "tex-live"];

/// Everything the classifier decided for one report.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// One entry per real file, in report order.
    pub files: Vec<ClassifiedFile>,
    /// Usage of every package in the policy table.
    pub usage: Vec<PackageUsage>,
}

impl Classification {
    pub fn by_origin(&self, origin: Origin) -> impl Iterator<Item = &ClassifiedFile> {
        self.files.iter().filter(move |f| f.origin == origin)
    }

    pub fn is_used(&self, package: &str) -> bool {
        self.usage
            .iter()
            .any(|u| u.package_name == package && u.used)
    }

    /// Excluded files that do not look like part of a TeX installation.
    pub fn excluded_outside_system(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.by_origin(Origin::ExcludedSystem)
            .filter(|f| !f.in_system_tree)
    }
}

/// Classifies dependency paths relative to one project root.
pub struct Classifier<'a> {
    root: PathBuf,
    canonical_root: PathBuf,
    policies: &'a PolicyTable,
    bundle_patterns: PatternSet,
    exclude_patterns: PatternSet,
    system_roots: Vec<PathBuf>,
}

impl<'a> Classifier<'a> {
    pub fn new(
        root: &Path,
        policies: &'a PolicyTable,
        bundle_patterns: &[String],
        exclude_patterns: &[String],
        system_roots: &[PathBuf],
    ) -> Result<Self> {
        let canonical_root = fs::canonicalize(root)?;
        let root = if root.is_absolute() {
            normalize_lexically(root)
        } else {
            normalize_lexically(&std::env::current_dir()?.join(root))
        };
        let system_roots = system_roots
            .iter()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| normalize_lexically(p)))
            .collect();

        Ok(Self {
            root,
            canonical_root,
            policies,
            bundle_patterns: PatternSet::new(bundle_patterns)?,
            exclude_patterns: PatternSet::new(exclude_patterns)?,
            system_roots,
        })
    }

    /// Classify every entry, collapsing entries that name the same real file.
    pub fn classify(&self, entries: &[DependencyEntry]) -> Result<Classification> {
        let mut files = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for entry in entries {
            let file = self.classify_entry(entry)?;
            if !seen.insert(file.real_path.clone()) {
                debug!(
                    "Skipping {}: same file as an earlier entry",
                    entry.path.display()
                );
                continue;
            }
            trace!(
                "{} -> {} ({})",
                entry.path.display(),
                file.canonical_relative_path,
                file.origin
            );
            files.push(file);
        }

        let usage = self
            .policies
            .names()
            .map(|name| PackageUsage {
                package_name: name.to_string(),
                used: files.iter().any(|f| f.package.as_deref() == Some(name)),
            })
            .collect();

        Ok(Classification { files, usage })
    }

    /// Classify a single entry.
    pub fn classify_entry(&self, entry: &DependencyEntry) -> Result<ClassifiedFile> {
        let joined = if entry.path.is_absolute() {
            normalize_lexically(&entry.path)
        } else {
            normalize_lexically(&self.root.join(&entry.path))
        };
        let link_end = resolve_symlinks(&joined)?;
        let real_path = match fs::canonicalize(&link_end) {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => link_end.clone(),
            Err(e) => return Err(Error::Io(e)),
        };

        let make = |origin: Origin, rel: String, package: Option<String>, system: bool| {
            ClassifiedFile {
                path: entry.path.clone(),
                real_path: real_path.clone(),
                origin,
                kind: entry.kind,
                canonical_relative_path: rel,
                package,
                in_system_tree: system,
            }
        };

        if let Some(rel) = self.project_relative(&joined, &real_path) {
            return Ok(make(Origin::Project, rel, None, false));
        }

        let in_system_tree = self.is_system_path(&joined) || self.is_system_path(&real_path);
        let package = if in_system_tree {
            self.package_of(&joined)
        } else {
            None
        };
        let file_name = joined
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Explicit user exclusions win over built-in and user bundling.
        if self.exclude_patterns.matches(&joined) {
            debug!("Excluding {} (matches an exclude pattern)", joined.display());
            return Ok(make(Origin::ExcludedSystem, file_name, package, in_system_tree));
        }
        // Bundle patterns name the directory holding the file, inside a TeX tree.
        let pattern_match = in_system_tree && self.bundle_patterns.matches_directory(&joined);
        if package.is_some() || pattern_match {
            return Ok(make(Origin::BundledPackage, file_name, package, in_system_tree));
        }
        Ok(make(Origin::ExcludedSystem, file_name, None, in_system_tree))
    }

    /// The project-relative path, if the file belongs to the project.
    fn project_relative(&self, joined: &Path, real: &Path) -> Option<String> {
        let candidates = [
            (joined, self.root.as_path()),
            (joined, self.canonical_root.as_path()),
            (real, self.canonical_root.as_path()),
        ];
        candidates.iter().find_map(|(path, root)| {
            path.strip_prefix(root)
                .ok()
                .filter(|rel| !rel.as_os_str().is_empty())
                .map(to_archive_string)
        })
    }

    fn is_system_path(&self, path: &Path) -> bool {
        if self.system_roots.iter().any(|root| path.starts_with(root)) {
            return true;
        }
        path.components().any(|c| match c {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                name.starts_with("texmf") || SYSTEM_TREE_MARKERS.contains(&name.as_ref())
            }
            _ => false,
        })
    }

    /// First directory along the path named after a configured package.
    fn package_of(&self, path: &Path) -> Option<String> {
        path.parent()?.components().find_map(|c| match c {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                self.policies
                    .contains(&name)
                    .then(|| name.to_string())
            }
            _ => None,
        })
    }
}

/// Resolve every symlink along `path`, directories included.
///
/// Components are walked one at a time. A link's target is spliced in place
/// of the link and walked in turn, so links inside link targets are followed
/// too. More than [`MAX_LINK_HOPS`] links on one path is a cycle. Components
/// that do not exist are kept as written.
pub fn resolve_symlinks(path: &Path) -> Result<PathBuf> {
    let mut pending = reversed_components(path);
    let mut resolved = PathBuf::new();
    let mut hops = 0;

    while let Some(part) = pending.pop() {
        match part.components().next() {
            Some(Component::Normal(_)) => {
                let candidate = resolved.join(&part);
                match fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        hops += 1;
                        if hops > MAX_LINK_HOPS {
                            return Err(Error::SymlinkCycle {
                                path: path.to_path_buf(),
                            });
                        }
                        let target = fs::read_link(&candidate)?;
                        if target.is_absolute() {
                            resolved = PathBuf::new();
                        }
                        pending.extend(reversed_components(&target));
                    }
                    _ => resolved = candidate,
                }
            }
            Some(Component::ParentDir) => {
                let can_pop = matches!(
                    resolved.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    resolved.pop();
                } else if !resolved.has_root() {
                    resolved.push("..");
                }
            }
            Some(Component::CurDir) | None => {}
            Some(Component::RootDir) | Some(Component::Prefix(_)) => resolved.push(&part),
        }
    }

    Ok(resolved)
}

fn reversed_components(path: &Path) -> Vec<PathBuf> {
    path.components()
        .rev()
        .map(|c| PathBuf::from(c.as_os_str()))
        .collect()
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_archive_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table() -> PolicyTable {
        PolicyTable::with_defaults()
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_lexically(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_relative_project_file() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("fig")).unwrap();
        fs::write(dir.path().join("fig/plot.pdf"), b"pdf").unwrap();
        let policies = table();
        let classifier = Classifier::new(dir.path(), &policies, &[], &[], &[]).unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source("./fig/plot.pdf"))
            .unwrap();
        assert_eq!(file.origin, Origin::Project);
        assert_eq!(file.canonical_relative_path, "fig/plot.pdf");
    }

    #[test]
    fn test_absolute_path_inside_root_is_project() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.tex"), b"x").unwrap();
        let policies = table();
        let classifier = Classifier::new(dir.path(), &policies, &[], &[], &[]).unwrap();

        let abs = fs::canonicalize(dir.path()).unwrap().join("paper.tex");
        let file = classifier
            .classify_entry(&DependencyEntry::source(abs))
            .unwrap();
        assert_eq!(file.origin, Origin::Project);
        assert_eq!(file.canonical_relative_path, "paper.tex");
        assert!(!file.canonical_relative_path.contains(".."));
    }

    #[test]
    fn test_default_package_in_system_tree_is_bundled() {
        let texmf = tempdir().unwrap();
        let sty_dir = texmf.path().join("texmf-dist/tex/latex/biblatex");
        fs::create_dir_all(&sty_dir).unwrap();
        fs::write(sty_dir.join("biblatex.sty"), b"sty").unwrap();
        let project = tempdir().unwrap();
        let policies = table();
        let classifier = Classifier::new(project.path(), &policies, &[], &[], &[]).unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source(sty_dir.join("biblatex.sty")))
            .unwrap();
        assert_eq!(file.origin, Origin::BundledPackage);
        assert_eq!(file.package.as_deref(), Some("biblatex"));
        assert_eq!(file.canonical_relative_path, "biblatex.sty");
        assert!(file.in_system_tree);
    }

    #[test]
    fn test_unconfigured_system_file_is_excluded() {
        let project = tempdir().unwrap();
        let policies = table();
        let classifier = Classifier::new(project.path(), &policies, &[], &[], &[]).unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source(
                "/usr/share/texlive/texmf-dist/tex/latex/hyperref/hyperref.sty",
            ))
            .unwrap();
        assert_eq!(file.origin, Origin::ExcludedSystem);
        assert!(file.in_system_tree);
    }

    #[test]
    fn test_outside_file_without_pattern_is_excluded() {
        let project = tempdir().unwrap();
        let policies = table();
        let classifier = Classifier::new(project.path(), &policies, &[], &[], &[]).unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source("/home/user/shared/figs/shared.png"))
            .unwrap();
        assert_eq!(file.origin, Origin::ExcludedSystem);
        assert!(!file.in_system_tree);
    }

    #[test]
    fn test_bundle_pattern_ignores_files_outside_tex_trees() {
        let project = tempdir().unwrap();
        let policies = table();
        let classifier =
            Classifier::new(project.path(), &policies, &["figs".to_string()], &[], &[]).unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source("/home/user/shared/figs/shared.png"))
            .unwrap();
        assert_eq!(file.origin, Origin::ExcludedSystem);
        assert!(!file.in_system_tree);
    }

    #[test]
    fn test_bundle_pattern_matches_parent_directory_in_tex_tree() {
        let project = tempdir().unwrap();
        let policies = table();
        let classifier = Classifier::new(
            project.path(),
            &policies,
            &["acm*".to_string()],
            &[],
            &[],
        )
        .unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source(
                "/usr/share/texlive/texmf-dist/tex/latex/acmart/acmart.cls",
            ))
            .unwrap();
        assert_eq!(file.origin, Origin::BundledPackage);
        assert_eq!(file.canonical_relative_path, "acmart.cls");
        assert_eq!(file.package, None);

        // Only the immediate parent counts, not directories further up.
        let nested = classifier
            .classify_entry(&DependencyEntry::source(
                "/usr/share/texlive/texmf-dist/tex/latex/acmart/extra/acmdoc.sty",
            ))
            .unwrap();
        assert_eq!(nested.origin, Origin::ExcludedSystem);

        // A matching file name alone is not enough.
        let by_name = classifier
            .classify_entry(&DependencyEntry::source(
                "/usr/share/texlive/texmf-dist/tex/latex/base/acmart.sty",
            ))
            .unwrap();
        assert_eq!(by_name.origin, Origin::ExcludedSystem);
    }

    #[test]
    fn test_exclude_pattern_beats_default_package() {
        let project = tempdir().unwrap();
        let policies = table();
        let classifier =
            Classifier::new(project.path(), &policies, &[], &["biblatex".to_string()], &[])
                .unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source(
                "/usr/share/texlive/texmf-dist/tex/latex/biblatex/biblatex.sty",
            ))
            .unwrap();
        assert_eq!(file.origin, Origin::ExcludedSystem);
        assert_eq!(file.package.as_deref(), Some("biblatex"));
    }

    #[test]
    fn test_configured_system_root() {
        let project = tempdir().unwrap();
        let policies = table();
        let classifier = Classifier::new(
            project.path(),
            &policies,
            &[],
            &[],
            &[PathBuf::from("/opt/tex")],
        )
        .unwrap();

        let file = classifier
            .classify_entry(&DependencyEntry::source("/opt/tex/latex/biblatex/biblatex.sty"))
            .unwrap();
        assert_eq!(file.origin, Origin::BundledPackage);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_fatal() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink("b.tex", dir.path().join("a.tex")).unwrap();
        std::os::unix::fs::symlink("a.tex", dir.path().join("b.tex")).unwrap();
        let policies = table();
        let classifier = Classifier::new(dir.path(), &policies, &[], &[], &[]).unwrap();

        let err = classifier
            .classify(&[DependencyEntry::source("a.tex")])
            .unwrap_err();
        assert!(matches!(err, Error::SymlinkCycle { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_self_link_is_a_cycle() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("loop.tex");
        std::os::unix::fs::symlink("loop.tex", &link).unwrap();
        assert!(matches!(
            resolve_symlinks(&link).unwrap_err(),
            Error::SymlinkCycle { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlink_cycle_is_fatal() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink("d2", dir.path().join("d1")).unwrap();
        std::os::unix::fs::symlink("d1", dir.path().join("d2")).unwrap();
        let policies = table();
        let classifier = Classifier::new(dir.path(), &policies, &[], &[], &[]).unwrap();

        let err = classifier
            .classify(&[DependencyEntry::source("d1/x.tex")])
            .unwrap_err();
        assert!(matches!(err, Error::SymlinkCycle { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_resolves() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/intro.tex"), b"x").unwrap();
        std::os::unix::fs::symlink("real", dir.path().join("alias")).unwrap();

        let resolved = resolve_symlinks(&dir.path().join("alias/intro.tex")).unwrap();
        assert_eq!(
            resolved,
            fs::canonicalize(dir.path().join("real/intro.tex")).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_duplicates_collapse() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("macros.tex"), b"x").unwrap();
        std::os::unix::fs::symlink("macros.tex", dir.path().join("alias.tex")).unwrap();
        let policies = table();
        let classifier = Classifier::new(dir.path(), &policies, &[], &[], &[]).unwrap();

        let classification = classifier
            .classify(&[
                DependencyEntry::source("macros.tex"),
                DependencyEntry::source("alias.tex"),
                DependencyEntry::source("./macros.tex"),
            ])
            .unwrap();
        assert_eq!(classification.files.len(), 1);
        assert_eq!(classification.files[0].canonical_relative_path, "macros.tex");
    }

    #[test]
    fn test_usage_tracks_packages() {
        let project = tempdir().unwrap();
        let mut policies = table();
        policies.add_package("refstyle");
        let classifier = Classifier::new(project.path(), &policies, &[], &[], &[]).unwrap();

        let classification = classifier
            .classify(&[DependencyEntry::source(
                "/usr/share/texlive/texmf-dist/tex/latex/refstyle/refstyle.sty",
            )])
            .unwrap();
        assert!(classification.is_used("refstyle"));
        assert!(!classification.is_used("biblatex"));
        assert_eq!(classification.usage.len(), 2);
    }
}
