//! Run configuration.

use arxiv_collector_common::{Error, Result};
use arxiv_collector_manifest::PolicyTable;
use arxiv_collector_sanitize::SanitizerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional per-project configuration file in the project root.
pub const CONFIG_FILE_NAME: &str = "arxiv-collector.yaml";

/// Everything one collection run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// Directory holding the main document.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Main document base name; guessed when absent.
    #[serde(default)]
    pub main_document: Option<String>,
    /// Output archive path, relative to the project root unless absolute.
    #[serde(default = "default_dest")]
    pub dest: PathBuf,
    /// System packages bundled whenever they are used.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    /// Packages never bundled, even if they are defaults.
    #[serde(default)]
    pub skip_packages: Vec<String>,
    /// Globs on the name of a TeX-tree file's parent directory; matching files are bundled.
    #[serde(default)]
    pub bundle_patterns: Vec<String>,
    /// Globs for files never to bundle.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Extra TeX installation roots besides the recognised `texmf*` trees.
    #[serde(default)]
    pub system_roots: Vec<PathBuf>,
    #[serde(default = "default_true")]
    pub strip_comments: bool,
    /// Extensions of project files run through the comment stripper.
    #[serde(default = "default_sanitize_extensions")]
    pub sanitize_extensions: Vec<String>,
    /// Additional verbatim-like environments.
    #[serde(default)]
    pub verbatim_environments: Vec<String>,
    /// Additional `\verb`-like commands.
    #[serde(default)]
    pub inline_verbatim_commands: Vec<String>,
    /// Archive used `.bib` files too, even though arXiv ignores them.
    #[serde(default)]
    pub include_bib: bool,
    /// Archive name for a `.bib` trimmed to the cited entries.
    #[serde(default)]
    pub extract_bib: Option<String>,
    #[serde(default = "default_latexmk")]
    pub latexmk: PathBuf,
    #[serde(default = "default_biber")]
    pub biber: PathBuf,
    /// Existing dependency report; skips the build.
    #[serde(default)]
    pub deps_file: Option<PathBuf>,
    /// Leave the generated report on disk afterwards.
    #[serde(default)]
    pub keep_deps: bool,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_dest() -> PathBuf {
    PathBuf::from("arxiv.tar.gz")
}
fn default_packages() -> Vec<String> {
    arxiv_collector_manifest::DEFAULT_PACKAGES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_true() -> bool {
    true
}
fn default_sanitize_extensions() -> Vec<String> {
    vec!["tex".to_string()]
}
fn default_latexmk() -> PathBuf {
    PathBuf::from("latexmk")
}
fn default_biber() -> PathBuf {
    PathBuf::from("biber")
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            main_document: None,
            dest: default_dest(),
            packages: default_packages(),
            skip_packages: Vec::new(),
            bundle_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            system_roots: Vec::new(),
            strip_comments: default_true(),
            sanitize_extensions: default_sanitize_extensions(),
            verbatim_environments: Vec::new(),
            inline_verbatim_commands: Vec::new(),
            include_bib: false,
            extract_bib: None,
            latexmk: default_latexmk(),
            biber: default_biber(),
            deps_file: None,
            keep_deps: false,
        }
    }
}

impl CollectorConfig {
    /// Defaults rooted at `root`.
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Self::default()
        }
    }

    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingFile {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load `arxiv-collector.yaml` from `root` if present, else defaults.
    /// A relative `project_root` in the file is taken relative to `root`.
    pub fn discover(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::for_project(root));
        }
        let mut config = Self::load(&path)?;
        if config.project_root.is_relative() {
            config.project_root = root.join(&config.project_root);
        }
        Ok(config)
    }

    /// The package table: defaults, plus requested packages, minus skipped ones.
    pub fn policy_table(&self) -> PolicyTable {
        let mut table = PolicyTable::with_defaults();
        let defaults: Vec<String> = table.names().map(str::to_string).collect();
        for name in defaults {
            if !self.packages.contains(&name) {
                table.remove(&name);
            }
        }
        for name in &self.packages {
            table.add_package(name);
        }
        for name in &self.skip_packages {
            table.remove(name);
        }
        table
    }

    pub fn sanitizer_config(&self) -> SanitizerConfig {
        SanitizerConfig {
            strip_comments: self.strip_comments,
            extra_environments: self.verbatim_environments.clone(),
            extra_inline_commands: self.inline_verbatim_commands.clone(),
        }
    }

    /// Where the archive goes.
    pub fn dest_path(&self) -> PathBuf {
        if self.dest.is_absolute() {
            self.dest.clone()
        } else {
            self.project_root.join(&self.dest)
        }
    }

    /// The dependency report to read, if one was supplied.
    pub fn deps_path(&self) -> Option<PathBuf> {
        self.deps_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.project_root.join(p)
            }
        })
    }
}
