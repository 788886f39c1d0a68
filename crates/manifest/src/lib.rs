//! Data model for arxiv-collector runs.
//!
//! This crate defines the values flowing through one collection run:
//! dependency entries read from the build tool's report, classified files,
//! the package policy table, and the archive manifest handed to the builder.

pub mod classified;
pub mod dependency;
pub mod manifest;
pub mod policy;
pub mod validation;

pub use classified::{ClassifiedFile, Origin, PackageUsage};
pub use dependency::{DependencyEntry, DependencyKind, DependencyReport};
pub use manifest::{ArchiveManifest, ByteSource, ManifestEntry};
pub use policy::{
    default_conversions, ConversionRule, PackagePolicy, PolicyTable, SubstituteRule,
    DEFAULT_PACKAGES,
};
pub use validation::{normalize_archive_path, validate_manifest};
