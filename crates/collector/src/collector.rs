//! The collection pipeline.

use crate::archive::{write_archive, ArchiveOptions, ArchiveSummary};
use crate::classify::{Classification, Classifier};
use crate::config::CollectorConfig;
use crate::deps::parse_report;
use crate::latexmk;
use crate::main_doc::resolve_main_document;
use crate::runner::{CommandRunner, LocalRunner};
use crate::substitute::{SubstitutePlan, SubstituteResolver};
use arxiv_collector_common::{format_size, Error, Result};
use arxiv_collector_manifest::{
    ArchiveManifest, ByteSource, ClassifiedFile, DependencyKind, DependencyReport, Origin,
};
use arxiv_collector_sanitize::{SanitizeStats, Sanitizer};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything one run decided, and the archive it wrote.
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub report: DependencyReport,
    pub classification: Classification,
    pub manifest: ArchiveManifest,
    /// Present once the archive has been written.
    pub summary: Option<ArchiveSummary>,
    pub sanitize_stats: SanitizeStats,
    /// Reported paths left out as system files.
    pub excluded: Vec<PathBuf>,
}

impl CollectionReport {
    /// One-line summary for the user.
    pub fn summary_line(&self) -> Option<String> {
        self.summary.as_ref().map(|s| {
            format!(
                "Output in {}: {} files, {} compressed ({} uncompressed)",
                s.path.display(),
                s.file_count,
                format_size(s.compressed_bytes),
                format_size(s.total_bytes)
            )
        })
    }
}

/// A dependency report on disk and whether this run created it.
#[derive(Debug, Clone)]
pub struct PreparedReport {
    pub path: PathBuf,
    pub generated: bool,
}

/// Drives one collection run.
pub struct Collector<R: CommandRunner = LocalRunner> {
    config: CollectorConfig,
    runner: R,
    archive_options: ArchiveOptions,
}

impl Collector<LocalRunner> {
    /// Create a collector running tools on this machine.
    pub fn new(config: CollectorConfig) -> Self {
        Self::with_runner(config, LocalRunner::new())
    }
}

impl<R: CommandRunner> Collector<R> {
    pub fn with_runner(config: CollectorConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            archive_options: ArchiveOptions::from_env(),
        }
    }

    pub fn with_archive_options(mut self, options: ArchiveOptions) -> Self {
        self.archive_options = options;
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Use the supplied dependency report, or build the document to get one.
    pub fn prepare_report(&self) -> Result<PreparedReport> {
        if let Some(path) = self.config.deps_path() {
            debug!("Using existing dependency report {}", path.display());
            return Ok(PreparedReport {
                path,
                generated: false,
            });
        }

        let root = &self.config.project_root;
        let version = latexmk::latexmk_version(&self.runner, &self.config.latexmk, root)?;
        debug!("latexmk version {}", version);
        latexmk::check_version(&version)?;

        let base_name = resolve_main_document(root, self.config.main_document.as_deref())?;
        let path = latexmk::fresh_deps_path(root);
        latexmk::build(&self.runner, &self.config.latexmk, root, &base_name, &path)?;
        Ok(PreparedReport {
            path,
            generated: true,
        })
    }

    /// Work out the archive contents without writing anything.
    pub fn plan(&self) -> Result<CollectionReport> {
        self.with_report(|path| self.plan_from(path))
    }

    /// Run the whole pipeline and write the archive.
    pub fn collect(&self) -> Result<CollectionReport> {
        self.with_report(|path| {
            let mut collection = self.plan_from(path)?;
            let dest = self.config.dest_path();
            info!("Writing {} files to {}...", collection.manifest.len(), dest.display());
            let summary = write_archive(&collection.manifest, &dest, &self.archive_options)?;
            collection.summary = Some(summary);
            Ok(collection)
        })
    }

    /// Run `f` on a prepared report, removing it afterwards if we made it.
    fn with_report<T>(&self, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        let prepared = self.prepare_report()?;
        let result = f(&prepared.path);
        if prepared.generated && !self.config.keep_deps {
            if let Err(e) = std::fs::remove_file(&prepared.path) {
                warn!("Could not remove {}: {}", prepared.path.display(), e);
            }
        }
        result
    }

    /// Parse, classify, resolve substitutes and assemble the manifest.
    pub fn plan_from(&self, deps_path: &Path) -> Result<CollectionReport> {
        let root = &self.config.project_root;
        let report = parse_report(deps_path)?;
        info!(
            "Collecting {} ({} dependencies)",
            report.source_file,
            report.entries.len()
        );

        let policies = self.config.policy_table();
        let classifier = Classifier::new(
            root,
            &policies,
            &self.config.bundle_patterns,
            &self.config.exclude_patterns,
            &self.config.system_roots,
        )?;
        let classification = classifier.classify(&report.entries)?;

        for usage in &classification.usage {
            if usage.used {
                info!("Bundling package {}", usage.package_name);
            }
        }
        for file in classification.excluded_outside_system() {
            warn!(
                "Not including {}: it is outside the project and not part of a TeX installation",
                file.path.display()
            );
        }
        let excluded: Vec<PathBuf> = classification
            .by_origin(Origin::ExcludedSystem)
            .map(|f| f.path.clone())
            .collect();

        let substitutes = SubstituteResolver::new(root, &policies, &self.runner)
            .include_inputs(self.config.include_bib)
            .extract_bib(self.config.extract_bib.clone(), &self.config.biber)
            .resolve(&report, &classification)?;

        let (manifest, sanitize_stats) = self.assemble(&classification, substitutes)?;
        debug!(
            "Stripped {} comments ({} bytes) from {} files",
            sanitize_stats.comments_stripped, sanitize_stats.bytes_removed, sanitize_stats.files
        );

        Ok(CollectionReport {
            report,
            classification,
            manifest,
            summary: None,
            sanitize_stats,
            excluded,
        })
    }

    fn assemble(
        &self,
        classification: &Classification,
        substitutes: SubstitutePlan,
    ) -> Result<(ArchiveManifest, SanitizeStats)> {
        let sanitizer = Sanitizer::with_config(self.config.sanitizer_config());
        let mut stats = SanitizeStats::default();
        let mut manifest = ArchiveManifest::new();

        for file in &classification.files {
            if !file.origin.is_archived() {
                continue;
            }
            if file.kind == DependencyKind::Generated {
                debug!("Skipping {}: generated by the build", file.path.display());
                continue;
            }
            if substitutes.covers(file) {
                continue;
            }

            let source = if sanitizer.is_enabled() && self.should_sanitize(file) {
                let result = sanitizer
                    .sanitize_file(&file.real_path)
                    .map_err(|e| match e.kind() {
                        std::io::ErrorKind::NotFound => Error::MissingFile {
                            path: file.real_path.clone(),
                        },
                        _ => Error::Io(e),
                    })?;
                stats.merge(&result.stats);
                ByteSource::Sanitized {
                    path: file.real_path.clone(),
                    content: result.content,
                }
            } else {
                ByteSource::Original {
                    path: file.real_path.clone(),
                }
            };
            debug!("Adding {} ({})", file.canonical_relative_path, file.origin);
            manifest.push(&file.canonical_relative_path, source)?;
        }

        for (archive_path, source) in substitutes.entries {
            manifest.push(&archive_path, source)?;
        }
        manifest.finalize();
        Ok((manifest, stats))
    }

    fn should_sanitize(&self, file: &ClassifiedFile) -> bool {
        file.origin == Origin::Project
            && file
                .extension()
                .map(|ext| {
                    self.config
                        .sanitize_extensions
                        .iter()
                        .any(|e| e.eq_ignore_ascii_case(&ext))
                })
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::scripted::ScriptedRunner;
    use std::fs;
    use tempfile::tempdir;

    const BANNER: &str = "Latexmk, John Collins, 7 Apr. 2023. Version 4.80\n";

    fn deps_text(deps: &[&str]) -> String {
        let mut text = String::from("#===Dependents, and related info, for paper.tex:\npaper.pdf :\\\n");
        for dep in deps {
            text.push_str(&format!("    {}\\\n", dep));
        }
        text.push_str("#===End dependents for paper.tex:\n");
        text
    }

    fn write_deps(root: &Path, name: &str, deps: &[&str]) {
        fs::write(root.join(name), deps_text(deps)).unwrap();
    }

    #[test]
    fn test_plan_from_existing_report() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.tex"), "Hi. % secret\n").unwrap();
        write_deps(dir.path(), "paper.deps", &["paper.tex"]);
        let config = CollectorConfig {
            deps_file: Some(PathBuf::from("paper.deps")),
            ..CollectorConfig::for_project(dir.path())
        };

        let collection = Collector::with_runner(config, ScriptedRunner::new(vec![]))
            .plan()
            .unwrap();
        assert_eq!(collection.manifest.paths(), vec!["paper.tex"]);
        assert!(collection.summary.is_none());
        assert_eq!(
            collection.manifest.entries()[0].source.read().unwrap(),
            b"Hi. %\n".to_vec()
        );
        assert!(dir.path().join("paper.deps").exists());
    }

    #[test]
    fn test_build_then_remove_generated_report() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.tex"), "Hi.\n").unwrap();
        // The scripted build "writes" the report up front.
        write_deps(dir.path(), ".deps", &["paper.tex"]);
        fs::rename(dir.path().join(".deps"), dir.path().join("prepared")).unwrap();

        struct Building {
            inner: ScriptedRunner,
            root: PathBuf,
        }
        impl CommandRunner for Building {
            fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<crate::CommandOutput> {
                if args.iter().any(|a| a == "-deps") {
                    fs::rename(self.root.join("prepared"), self.root.join(".deps"))?;
                }
                self.inner.run(program, args, cwd)
            }
        }

        let runner = Building {
            inner: ScriptedRunner::new(vec![ScriptedRunner::ok(BANNER), ScriptedRunner::ok("")]),
            root: dir.path().to_path_buf(),
        };
        let collector = Collector::with_runner(CollectorConfig::for_project(dir.path()), runner);
        let collection = collector.plan().unwrap();
        assert_eq!(collection.report.base_name, "paper");
        assert!(!dir.path().join(".deps").exists());
    }

    #[test]
    fn test_build_with_relative_project_root() {
        // Writes the report where latexmk would: relative to its working directory.
        struct Latexmk {
            inner: ScriptedRunner,
        }
        impl CommandRunner for Latexmk {
            fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<crate::CommandOutput> {
                if let Some(out) = args.iter().find_map(|a| a.strip_prefix("-deps-out=")) {
                    fs::write(cwd.join(out), deps_text(&["paper.tex"]))?;
                }
                self.inner.run(program, args, cwd)
            }
        }

        let dir = tempfile::tempdir_in(".").unwrap();
        let root = dir.path().to_path_buf();
        assert!(root.is_relative());
        fs::write(root.join("paper.tex"), "Hi.\n").unwrap();

        let runner = Latexmk {
            inner: ScriptedRunner::new(vec![ScriptedRunner::ok(BANNER), ScriptedRunner::ok("")]),
        };
        let collector = Collector::with_runner(CollectorConfig::for_project(&root), runner);
        let collection = collector.plan().unwrap();
        assert_eq!(collection.manifest.paths(), vec!["paper.tex"]);
        assert!(!root.join(".deps").exists());
        assert!(!root.join(&root).exists());
    }

    #[test]
    fn test_incompatible_latexmk_stops_before_build() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.tex"), "Hi.\n").unwrap();
        let runner = ScriptedRunner::new(vec![ScriptedRunner::ok(
            "Latexmk, John Collins, 1 January 2019. Version 4.64\n",
        )]);
        let collector = Collector::with_runner(CollectorConfig::for_project(dir.path()), runner);
        assert!(matches!(
            collector.plan().unwrap_err(),
            Error::IncompatibleBuildTool { .. }
        ));
    }

    #[test]
    fn test_generated_entries_are_not_archived_directly() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.tex"), "Hi.\n").unwrap();
        fs::write(dir.path().join("paper.bbl"), "bbl").unwrap();
        write_deps(dir.path(), "d", &["paper.tex", "paper.bbl"]);
        let config = CollectorConfig {
            deps_file: Some(PathBuf::from("d")),
            ..CollectorConfig::for_project(dir.path())
        };

        let collection = Collector::with_runner(config, ScriptedRunner::new(vec![]))
            .plan()
            .unwrap();
        assert_eq!(collection.manifest.paths(), vec!["paper.bbl", "paper.tex"]);
        assert!(matches!(
            collection.manifest.entries()[0].source,
            ByteSource::SubstituteFile { .. }
        ));
    }

    #[test]
    fn test_only_tex_files_are_sanitized() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.tex"), "a % b\n").unwrap();
        fs::write(dir.path().join("data.csv"), "x,% y\n").unwrap();
        write_deps(dir.path(), "d", &["paper.tex", "data.csv"]);
        let config = CollectorConfig {
            deps_file: Some(PathBuf::from("d")),
            ..CollectorConfig::for_project(dir.path())
        };

        let collection = Collector::with_runner(config, ScriptedRunner::new(vec![]))
            .plan()
            .unwrap();
        let entries = collection.manifest.entries();
        assert!(matches!(entries[0].source, ByteSource::Original { .. }));
        assert!(matches!(entries[1].source, ByteSource::Sanitized { .. }));
        assert_eq!(collection.sanitize_stats.comments_stripped, 1);
    }
}
