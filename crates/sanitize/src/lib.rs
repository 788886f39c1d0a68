//! Comment stripping for LaTeX sources bound for public archives.
//!
//! Line comments are removed from document sources before packaging. Text
//! inside verbatim-style environments and inline verbatim commands is left
//! untouched. All work happens in memory; files on disk are never rewritten.

pub mod environments;
pub mod sanitizer;
pub mod scanner;

pub use environments::VerbatimSyntax;
pub use sanitizer::{Outcome, SanitizeResult, SanitizeStats, Sanitizer, SanitizerConfig};
pub use scanner::{ScanError, ScanState, Scanner};

/// The TeX line comment character.
pub const COMMENT_CHAR: u8 = b'%';
