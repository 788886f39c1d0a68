//! Output verbosity levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How chatty a run should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Only errors.
    Silent,
    /// Stage progress and the final summary.
    #[default]
    Quiet,
    /// Every file decision.
    Verbose,
    /// Everything, including scanner internals.
    Debug,
}

impl Verbosity {
    /// The `tracing_subscriber::EnvFilter` directive for this level.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Silent => "error",
            Verbosity::Quiet => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Debug => "trace",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verbosity::Silent => write!(f, "silent"),
            Verbosity::Quiet => write!(f, "quiet"),
            Verbosity::Verbose => write!(f, "verbose"),
            Verbosity::Debug => write!(f, "debug"),
        }
    }
}

impl FromStr for Verbosity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" => Ok(Verbosity::Silent),
            "quiet" | "default" => Ok(Verbosity::Quiet),
            "verbose" => Ok(Verbosity::Verbose),
            "debug" => Ok(Verbosity::Debug),
            _ => Err(crate::Error::Config(format!("unknown verbosity: {}", s))),
        }
    }
}
