//! Output transformation pipes.
//!
//! Output pipes transform a command's buffered lines before parsing;
//! retention pipes transform the single value about to be retained.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every run of whitespace into one space.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").into_owned()
}

/// What a pipe needs to know about the command being processed.
#[derive(Debug, Clone, Copy)]
pub struct PipeContext<'a> {
    /// Command text after variable substitution.
    pub command: &'a str,
    /// Learned prompt of the channel, possibly empty.
    pub prompt: &'a str,
}

impl PipeContext<'_> {
    /// Remove command echo and prompt artifacts from `line`.
    pub fn clear(&self, line: &str) -> String {
        let mut cleared = line.to_string();
        if !self.command.is_empty() {
            cleared = cleared.replace(self.command, "");
        }
        if !self.prompt.is_empty() {
            cleared = cleared.replace(self.prompt, "");
        }
        cleared
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputPipe {
    /// Strip command echo and prompt from every line.
    Clearing,
    FirstLine,
    /// Last non-blank line, trailing whitespace trimmed.
    LastLine,
    Whitespace,
}

impl OutputPipe {
    pub fn pipe_lines(&self, lines: Vec<String>, context: &PipeContext<'_>) -> Vec<String> {
        match self {
            OutputPipe::Clearing => lines.iter().map(|line| context.clear(line)).collect(),
            OutputPipe::FirstLine => lines.into_iter().take(1).collect(),
            OutputPipe::LastLine => lines
                .iter()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| vec![line.trim_end().to_string()])
                .unwrap_or_default(),
            OutputPipe::Whitespace => lines.iter().map(|line| collapse_whitespace(line)).collect(),
        }
    }

    pub fn pipe_value(&self, value: &str, context: &PipeContext<'_>) -> String {
        match self {
            OutputPipe::Clearing => value
                .split('\n')
                .map(|line| context.clear(line))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputPipe::FirstLine => {
                let value = value.trim_start();
                value.split('\n').next().unwrap_or_default().to_string()
            }
            OutputPipe::LastLine => {
                let value = value.trim_end();
                value.rsplit('\n').next().unwrap_or_default().to_string()
            }
            OutputPipe::Whitespace => collapse_whitespace(value),
        }
    }
}
