//! Recognised verbatim environments and inline verbatim commands.

use regex::Regex;
use std::sync::LazyLock;

/// Environments whose body is literal text.
pub const DEFAULT_VERBATIM_ENVIRONMENTS: &[&str] = &[
    "verbatim",
    "verbatim*",
    "Verbatim",
    "Verbatim*",
    "BVerbatim",
    "LVerbatim",
    "lstlisting",
    "minted",
    "filecontents",
    "filecontents*",
];

/// Commands taking a delimited literal argument, e.g. `\verb|50%|`.
pub const DEFAULT_INLINE_COMMANDS: &[&str] = &["verb", "lstinline"];

/// `\begin{name}` at the start of the haystack.
pub static BEGIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\begin\s*\{([^{}]*)\}").unwrap());

/// `\name` at the start of the haystack, capturing the command name.
pub static COMMAND_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\([A-Za-z]+)(\*?)").unwrap());

/// Optional `[...]` argument of `\lstinline`.
pub static OPTIONAL_ARG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]").unwrap());

/// The set of literal markers the scanner honours.
#[derive(Debug, Clone)]
pub struct VerbatimSyntax {
    environments: Vec<String>,
    inline_commands: Vec<String>,
}

impl VerbatimSyntax {
    /// Defaults plus `extra` environments and commands.
    pub fn with_extra(extra_environments: &[String], extra_commands: &[String]) -> Self {
        let mut environments: Vec<String> = DEFAULT_VERBATIM_ENVIRONMENTS
            .iter()
            .map(|s| s.to_string())
            .collect();
        environments.extend(extra_environments.iter().cloned());

        let mut inline_commands: Vec<String> =
            DEFAULT_INLINE_COMMANDS.iter().map(|s| s.to_string()).collect();
        inline_commands.extend(extra_commands.iter().cloned());

        Self {
            environments,
            inline_commands,
        }
    }

    pub fn is_verbatim_environment(&self, name: &str) -> bool {
        self.environments.iter().any(|e| e == name.trim())
    }

    pub fn is_inline_command(&self, name: &str) -> bool {
        self.inline_commands.iter().any(|c| c == name)
    }

    /// Matcher for the end marker of `env`.
    pub fn end_pattern(env: &str) -> Regex {
        // Escaped input always compiles.
        Regex::new(&format!(r"\\end\s*\{{{}\}}", regex::escape(env))).unwrap()
    }
}

impl Default for VerbatimSyntax {
    fn default() -> Self {
        Self::with_extra(&[], &[])
    }
}
