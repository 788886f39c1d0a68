//! arxiv-collector - package a LaTeX project's used files for arXiv.

use anyhow::Context;
use arxiv_collector::{Collector, CollectorConfig};
use arxiv_collector_common::{format_size, Error, Verbosity};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "arxiv-collector")]
#[command(
    author,
    version,
    about = "Build a LaTeX document and archive exactly the files it used, ready for arXiv"
)]
struct Cli {
    /// Name of the main document; guessed if only one .tex file (or one of main/paper) exists
    base_name: Option<String>,

    /// Project directory
    #[arg(short = 'C', long, default_value = ".")]
    directory: PathBuf,

    /// Output archive
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Configuration file (defaults to arxiv-collector.yaml in the project)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Include all used .bib files, even though arXiv will ignore them
    #[arg(long)]
    include_bib: bool,

    /// Include a new .bib file, under this name, with only the cited entries
    #[arg(long, value_name = "NAME")]
    extract_bib: Option<String>,

    /// Bundle this system package whenever it is used (repeatable)
    #[arg(short = 'p', long = "include-package", value_name = "PACKAGE", action = ArgAction::Append)]
    packages: Vec<String>,

    /// Don't include biblatex even if it's used
    #[arg(long)]
    skip_biblatex: bool,

    /// Never bundle this package (repeatable)
    #[arg(long = "skip-package", value_name = "PACKAGE", action = ArgAction::Append)]
    skip_packages: Vec<String>,

    /// Bundle TeX-tree files whose parent directory name matches this glob (repeatable)
    #[arg(long = "bundle-pattern", value_name = "GLOB", action = ArgAction::Append)]
    bundle_patterns: Vec<String>,

    /// Never bundle files matching this glob (repeatable)
    #[arg(long = "exclude-pattern", value_name = "GLOB", action = ArgAction::Append)]
    exclude_patterns: Vec<String>,

    /// Leave comments in .tex files
    #[arg(long)]
    no_strip_comments: bool,

    /// Path to latexmk
    #[arg(long)]
    latexmk: Option<PathBuf>,

    /// Path to biber
    #[arg(long)]
    biber: Option<PathBuf>,

    /// Use an existing latexmk -deps report instead of building
    #[arg(long, value_name = "FILE")]
    latexmk_deps: Option<PathBuf>,

    /// Keep the dependency report written by the build
    #[arg(long)]
    keep_deps: bool,

    /// Print the archive listing as JSON instead of writing it
    #[arg(long)]
    list: bool,

    /// Print every file decision
    #[arg(short, long)]
    verbose: bool,

    /// Print everything, including scanner internals
    #[arg(long)]
    debug: bool,

    /// Only print warnings and errors (the default)
    #[arg(short, long)]
    quiet: bool,

    /// Only print errors
    #[arg(long)]
    silent: bool,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.debug {
            Verbosity::Debug
        } else if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else if self.silent {
            Verbosity::Silent
        } else {
            Verbosity::Quiet
        }
    }

    /// Configuration file values, overridden by flags.
    fn load_config(&self) -> anyhow::Result<CollectorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = CollectorConfig::load(path)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
                if config.project_root.is_relative() {
                    config.project_root = self.directory.join(&config.project_root);
                }
                config
            }
            None => CollectorConfig::discover(&self.directory)?,
        };

        if let Some(name) = &self.base_name {
            config.main_document = Some(name.clone());
        }
        if let Some(dest) = &self.dest {
            config.dest = dest.clone();
        }
        if self.include_bib {
            config.include_bib = true;
        }
        if self.extract_bib.is_some() {
            config.extract_bib = self.extract_bib.clone();
        }
        for package in &self.packages {
            if !config.packages.contains(package) {
                config.packages.push(package.clone());
            }
        }
        if self.skip_biblatex {
            config.skip_packages.push("biblatex".to_string());
        }
        config.skip_packages.extend(self.skip_packages.iter().cloned());
        config.bundle_patterns.extend(self.bundle_patterns.iter().cloned());
        config.exclude_patterns.extend(self.exclude_patterns.iter().cloned());
        if self.no_strip_comments {
            config.strip_comments = false;
        }
        if let Some(latexmk) = &self.latexmk {
            config.latexmk = latexmk.clone();
        }
        if let Some(biber) = &self.biber {
            config.biber = biber.clone();
        }
        if let Some(deps) = &self.latexmk_deps {
            config.deps_file = Some(deps.clone());
        }
        if self.keep_deps {
            config.keep_deps = true;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flags.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.verbosity().filter_directive()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    if let Err(err) = run(&cli) {
        if let Some(Error::BuildFailed { code, .. }) = err.downcast_ref::<Error>() {
            error!("{}", err);
            std::process::exit(code.unwrap_or(1));
        }
        return Err(err);
    }
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    let collector = Collector::new(config);

    if cli.list {
        let collection = collector.plan()?;
        println!("{}", collection.manifest.to_json()?);
        return Ok(());
    }

    let collection = collector.collect()?;
    if let Some(line) = collection.summary_line() {
        info!("{}", line);
    }
    if !collection.excluded.is_empty() {
        info!(
            "Left out {} system files assumed to exist on arXiv",
            collection.excluded.len()
        );
    }
    if collection.sanitize_stats.bytes_removed > 0 {
        info!(
            "Stripped {} of comments",
            format_size(collection.sanitize_stats.bytes_removed as u64)
        );
    }
    Ok(())
}
