//! Common utilities and types shared across arxiv-collector crates.

pub mod error;
pub mod hash;
pub mod size;
pub mod verbosity;

pub use error::{Error, Result};
pub use size::format_size;
pub use verbosity::Verbosity;
