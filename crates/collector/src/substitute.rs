//! Generated outputs shipped in place of the inputs that produce them.
//!
//! Two kinds of rule drive this stage, both plain data from the policy
//! table: substitute rules (a `.bbl` stands in for the `.bib` files that
//! generated it) and conversion rules (an `.eps` figure is archived as the
//! pdf the build converted it to).

use crate::classify::Classification;
use crate::runner::{describe, CommandRunner};
use arxiv_collector_common::{Error, Result};
use arxiv_collector_manifest::{
    default_conversions, ByteSource, ClassifiedFile, ConversionRule, DependencyKind,
    DependencyReport, PolicyTable, SubstituteRule,
};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What the resolver adds to the archive and what it keeps out.
#[derive(Debug, Clone, Default)]
pub struct SubstitutePlan {
    /// Archive path and byte source of every substitute.
    pub entries: Vec<(String, ByteSource)>,
    /// Real paths of reported files archived in converted form instead.
    pub replaced: HashSet<PathBuf>,
    /// Real paths of generation inputs kept out of the archive.
    pub suppressed: HashSet<PathBuf>,
}

impl SubstitutePlan {
    /// Whether a classified file is covered by a substitute and must not be
    /// archived on its own.
    pub fn covers(&self, file: &ClassifiedFile) -> bool {
        self.replaced.contains(&file.real_path) || self.suppressed.contains(&file.real_path)
    }
}

/// Resolves substitutes for one project.
pub struct SubstituteResolver<'a> {
    root: &'a Path,
    policies: &'a PolicyTable,
    runner: &'a dyn CommandRunner,
    conversions: Vec<ConversionRule>,
    include_inputs: bool,
    extract_bib: Option<String>,
    biber: PathBuf,
}

impl<'a> SubstituteResolver<'a> {
    pub fn new(root: &'a Path, policies: &'a PolicyTable, runner: &'a dyn CommandRunner) -> Self {
        Self {
            root,
            policies,
            runner,
            conversions: default_conversions(),
            include_inputs: false,
            extract_bib: None,
            biber: PathBuf::from("biber"),
        }
    }

    /// Keep generation inputs such as `.bib` files in the archive as well.
    pub fn include_inputs(mut self, include: bool) -> Self {
        self.include_inputs = include;
        self
    }

    /// Ship a trimmed `.bib` extracted by biber under `name`.
    pub fn extract_bib(mut self, name: Option<String>, biber: impl Into<PathBuf>) -> Self {
        self.extract_bib = name;
        self.biber = biber.into();
        self
    }

    pub fn resolve(
        &self,
        report: &DependencyReport,
        classification: &Classification,
    ) -> Result<SubstitutePlan> {
        let mut plan = SubstitutePlan::default();
        self.resolve_conversions(classification, &mut plan)?;

        let mut used_inputs: Vec<&ClassifiedFile> = Vec::new();
        for (rule, package) in self.active_rules(classification).values() {
            let inputs: Vec<&ClassifiedFile> = classification
                .files
                .iter()
                .filter(|f| f.origin.is_archived() && f.kind == DependencyKind::Source)
                .filter(|f| {
                    f.extension()
                        .map(|ext| rule.suppressed_inputs.contains(&ext))
                        .unwrap_or(false)
                })
                .collect();

            let output = self
                .root
                .join(format!("{}.{}", report.jobname, rule.output_extension));
            if output.is_file() {
                let archive_path = format!("{}.{}", report.base_name, rule.output_extension);
                debug!("Adding {} as {}", output.display(), archive_path);
                plan.entries
                    .push((archive_path, ByteSource::SubstituteFile { path: output }));
            } else if let Some(package) = package {
                return Err(Error::MissingGeneratedOutput {
                    package: package.clone(),
                    path: output,
                });
            } else if !inputs.is_empty() {
                warn!(
                    "Used a .{} file, but didn't find '{}'; this likely won't work.",
                    rule.suppressed_inputs.join("/."),
                    output.display()
                );
            }

            if !self.include_inputs {
                for input in &inputs {
                    debug!("Not archiving {} (generation input)", input.path.display());
                    plan.suppressed.insert(input.real_path.clone());
                }
            }
            used_inputs.extend(inputs);
        }

        if let Some(name) = &self.extract_bib {
            let content = self.extract_bibliography(report, &used_inputs)?;
            if let Some(content) = content {
                info!("Adding extracted bibliography: {}", name);
                plan.entries.push((name.clone(), content));
            }
        }

        Ok(plan)
    }

    /// The always-on bibliography rule, upgraded to mandatory by any used
    /// package that declares the same output.
    fn active_rules(
        &self,
        classification: &Classification,
    ) -> BTreeMap<String, (SubstituteRule, Option<String>)> {
        let mut rules = BTreeMap::new();
        let baseline = SubstituteRule::bibliography();
        rules.insert(baseline.output_extension.clone(), (baseline, None));

        for policy in self.policies.iter() {
            let Some(rule) = &policy.substitute else {
                continue;
            };
            if classification.is_used(&policy.name) {
                rules.insert(
                    rule.output_extension.clone(),
                    (rule.clone(), Some(policy.name.clone())),
                );
            }
        }
        rules
    }

    fn resolve_conversions(
        &self,
        classification: &Classification,
        plan: &mut SubstitutePlan,
    ) -> Result<()> {
        for file in classification
            .files
            .iter()
            .filter(|f| f.origin.is_archived() && f.kind == DependencyKind::Source)
        {
            let Some(ext) = file.extension() else {
                continue;
            };
            let Some(rule) = self.conversions.iter().find(|r| r.source_extension == ext) else {
                continue;
            };

            let reported = if file.path.is_absolute() {
                file.path.clone()
            } else {
                self.root.join(&file.path)
            };
            let converted = PathBuf::from(rule.converted_name(&strip_extension(
                &reported.to_string_lossy(),
            )));
            if !converted.is_file() {
                return Err(Error::MissingGeneratedOutput {
                    package: rule.producer.clone(),
                    path: converted,
                });
            }

            let archive_path = rule.archived_name(&strip_extension(&file.canonical_relative_path));
            debug!("Adding {} as {}", converted.display(), archive_path);
            plan.entries
                .push((archive_path, ByteSource::SubstituteFile { path: converted }));
            plan.replaced.insert(file.real_path.clone());
        }
        Ok(())
    }

    /// Run biber for a trimmed bibliography, falling back to the used inputs.
    fn extract_bibliography(
        &self,
        report: &DependencyReport,
        inputs: &[&ClassifiedFile],
    ) -> Result<Option<ByteSource>> {
        info!("Running biber on {}.bcf...", report.base_name);
        match self.run_biber(&report.base_name) {
            Ok(content) => Ok(Some(ByteSource::SubstituteBytes {
                producer: "biber".to_string(),
                content,
            })),
            Err(err) if err.is_recoverable() => {
                warn!("{}; shipping the full bibliography instead", err);
                let bibs: Vec<_> = inputs
                    .iter()
                    .filter(|f| f.extension().as_deref() == Some("bib"))
                    .collect();
                if bibs.is_empty() {
                    warn!("No .bib files were used; nothing to extract");
                    return Ok(None);
                }
                let mut content = Vec::new();
                for bib in bibs {
                    let bytes = ByteSource::Original {
                        path: bib.real_path.clone(),
                    }
                    .read()?;
                    content.extend_from_slice(&bytes);
                    if !content.ends_with(b"\n") {
                        content.push(b'\n');
                    }
                }
                Ok(Some(ByteSource::SubstituteBytes {
                    producer: "concatenated .bib files".to_string(),
                    content,
                }))
            }
            Err(err) => Err(err),
        }
    }

    fn run_biber(&self, base_name: &str) -> Result<Vec<u8>> {
        let args = vec![
            "--output-format=bibtex".to_string(),
            "-O".to_string(),
            "-".to_string(),
            "-q".to_string(),
            "-q".to_string(),
            format!("{}.bcf", base_name),
        ];
        let failure = |reason: String| Error::OptionalToolFailure {
            tool: describe(&self.biber, &args),
            reason,
        };

        let output = self
            .runner
            .run(&self.biber, &args, self.root)
            .map_err(|e| failure(e.to_string()))?;
        if !output.success() {
            return Err(failure(format!(
                "exit code {:?}: {}",
                output.code,
                output.combined().trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// Drop the last extension of a `/`-separated path.
fn strip_extension(path: &str) -> String {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => path[..name_start + dot].to_string(),
        _ => path.to_string(),
    }
}
