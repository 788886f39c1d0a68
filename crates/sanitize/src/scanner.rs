//! Two-state comment scanner.
//!
//! The scanner is either in [`ScanState::Normal`], where `%` starts a line
//! comment, or in [`ScanState::Verbatim`], where everything is copied until
//! the matching `\end{...}`. Inline verbatim commands are consumed whole while
//! in the normal state.

use crate::environments::{VerbatimSyntax, BEGIN_PATTERN, COMMAND_PATTERN, OPTIONAL_ARG_PATTERN};
use crate::COMMENT_CHAR;
use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// Where the scanner currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Normal,
    Verbatim { environment: String },
}

/// Input the scanner cannot handle safely.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("verbatim environment '{environment}' opened on line {line} is never closed")]
    UnterminatedVerbatim { environment: String, line: usize },
}

/// Counters collected during one scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanCounts {
    pub comments: usize,
    pub bytes_removed: usize,
    pub verbatim_regions: usize,
    pub inline_verbatim: usize,
}

/// Comment stripper over a single document.
pub struct Scanner<'a> {
    syntax: &'a VerbatimSyntax,
    state: ScanState,
    end_pattern: Option<Regex>,
    opened_at: usize,
    counts: ScanCounts,
}

impl<'a> Scanner<'a> {
    pub fn new(syntax: &'a VerbatimSyntax) -> Self {
        Self {
            syntax,
            state: ScanState::Normal,
            end_pattern: None,
            opened_at: 0,
            counts: ScanCounts::default(),
        }
    }

    /// Strip comments from `input`, keeping each `%` and the line break.
    pub fn scan(mut self, input: &str) -> Result<(String, ScanCounts), ScanError> {
        let mut out = String::with_capacity(input.len());
        for (idx, line) in input.split_inclusive('\n').enumerate() {
            self.scan_line(line, idx + 1, &mut out);
        }

        if let ScanState::Verbatim { environment } = self.state {
            return Err(ScanError::UnterminatedVerbatim {
                environment,
                line: self.opened_at,
            });
        }
        Ok((out, self.counts))
    }

    fn scan_line(&mut self, line: &str, lineno: usize, out: &mut String) {
        let (body, eol) = split_line_ending(line);
        let mut pos = 0;

        while pos < body.len() {
            let rest = &body[pos..];

            if let Some(end) = &self.end_pattern {
                match end.find(rest).map(|m| m.end()) {
                    Some(close) => {
                        out.push_str(&rest[..close]);
                        pos += close;
                        trace!("Leaving verbatim on line {}", lineno);
                        self.state = ScanState::Normal;
                        self.end_pattern = None;
                    }
                    None => {
                        out.push_str(rest);
                        pos = body.len();
                    }
                }
                continue;
            }

            match rest.as_bytes()[0] {
                COMMENT_CHAR => {
                    out.push('%');
                    self.counts.comments += 1;
                    self.counts.bytes_removed += rest.len() - 1;
                    pos = body.len();
                }
                b'\\' => pos += self.scan_command(rest, lineno, out),
                _ => {
                    let Some(ch) = rest.chars().next() else {
                        break;
                    };
                    out.push(ch);
                    pos += ch.len_utf8();
                }
            }
        }

        out.push_str(eol);
    }

    /// Handle text starting with a backslash; returns bytes consumed.
    fn scan_command(&mut self, rest: &str, lineno: usize, out: &mut String) -> usize {
        if let Some(caps) = BEGIN_PATTERN.captures(rest) {
            let end = caps.get(0).map_or(rest.len(), |m| m.end());
            let environment = caps[1].trim().to_string();
            out.push_str(&rest[..end]);
            if self.syntax.is_verbatim_environment(&environment) {
                trace!("Entering verbatim '{}' on line {}", environment, lineno);
                self.end_pattern = Some(VerbatimSyntax::end_pattern(&environment));
                self.state = ScanState::Verbatim { environment };
                self.opened_at = lineno;
                self.counts.verbatim_regions += 1;
            }
            return end;
        }

        if let Some(caps) = COMMAND_PATTERN.captures(rest) {
            let head = caps.get(0).map_or(rest.len(), |m| m.end());
            if self.syntax.is_inline_command(&caps[1]) {
                return self.scan_inline(rest, head, out);
            }
            out.push_str(&rest[..head]);
            return head;
        }

        // Control symbol such as \% or \\: the next character is never special.
        let end = rest
            .char_indices()
            .nth(1)
            .map_or(rest.len(), |(i, c)| i + c.len_utf8());
        out.push_str(&rest[..end]);
        end
    }

    /// Copy an inline verbatim command and its delimited argument unchanged.
    fn scan_inline(&mut self, rest: &str, head: usize, out: &mut String) -> usize {
        let mut start = head;
        if let Some(m) = OPTIONAL_ARG_PATTERN.find(&rest[start..]) {
            start += m.end();
        }

        let Some(open) = rest[start..].chars().next() else {
            out.push_str(rest);
            return rest.len();
        };
        let close = if open == '{' { '}' } else { open };
        let body_start = start + open.len_utf8();

        let end = match rest[body_start..].find(close) {
            Some(i) => body_start + i + close.len_utf8(),
            // Unclosed on this line: leave the remainder alone.
            None => rest.len(),
        };
        self.counts.inline_verbatim += 1;
        out.push_str(&rest[..end]);
        end
    }
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
