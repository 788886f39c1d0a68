//! External command execution.

use arxiv_collector_common::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

/// Trait for command execution, so tests can script the build tool.
pub trait CommandRunner {
    /// Run `program` with `args` in `cwd` to completion.
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<CommandOutput>;
}

/// Runs commands on this machine.
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for LocalRunner {
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        let resolved = which::which_in(program, std::env::var_os("PATH"), cwd)
            .map_err(|_| Error::ToolNotFound(program.display().to_string()))?;
        debug!("Running {} {}", resolved.display(), args.join(" "));

        let output = Command::new(&resolved)
            .args(args)
            .current_dir(cwd)
            .output()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Render a command line for messages.
pub fn describe(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

/// A runner replaying canned outputs, recording every call.
#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    pub(crate) struct ScriptedRunner {
        replies: RefCell<VecDeque<Result<CommandOutput>>>,
        pub(crate) calls: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(replies: Vec<Result<CommandOutput>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn ok(stdout: &str) -> Result<CommandOutput> {
            Ok(CommandOutput {
                code: Some(0),
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            })
        }

        pub(crate) fn failed(code: i32, stderr: &str) -> Result<CommandOutput> {
            Ok(CommandOutput {
                code: Some(code),
                stdout: Vec::new(),
                stderr: stderr.as_bytes().to_vec(),
            })
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &Path, args: &[String], _cwd: &Path) -> Result<CommandOutput> {
            self.calls
                .borrow_mut()
                .push((program.display().to_string(), args.to_vec()));
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(Error::ToolNotFound(program.display().to_string())))
        }
    }
}
