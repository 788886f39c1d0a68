//! arxiv-collector - gather a LaTeX project into a minimal archive for arXiv.
//!
//! The pipeline runs in one direction: the build tool's dependency report is
//! parsed ([`deps`]), every dependency is classified ([`classify`]), project
//! sources are sanitized and generated substitutes resolved ([`substitute`]),
//! and the resulting manifest is written as one deterministic archive
//! ([`archive`]). [`collector`] drives the whole run.

pub mod archive;
pub mod classify;
pub mod collector;
pub mod config;
pub mod deps;
pub mod latexmk;
pub mod main_doc;
pub mod patterns;
pub mod runner;
pub mod substitute;

pub use collector::{CollectionReport, Collector};
pub use config::CollectorConfig;
pub use runner::{CommandOutput, CommandRunner, LocalRunner};
