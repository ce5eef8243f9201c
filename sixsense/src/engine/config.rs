//! Engine-wide settings, injected into every session.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::channel::{SubstitutionRule, compile_rules};
use crate::error::{Result, WorkflowError};

/// Settings shared by the orchestrator and its sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of file retention; each session writes below `<dir>/<short id>`.
    pub session_execution_dir: PathBuf,
    /// Bytes read from a channel per attempt.
    pub read_buffer_size: usize,
    /// Operations allowed to run at the same time.
    pub max_concurrent_operations: usize,
    /// Learn a channel's prompt before its first command when unknown.
    pub learn_prompts: bool,
    pub prompt_probe_minimal_seconds: u64,
    pub prompt_probe_seconds_to_timeout: u64,
    /// Applied in order to every decoded chunk.
    pub substitution_rules: Vec<SubstitutionRule>,
    pub strip_ansi: bool,
    /// Appended to every command written to a channel.
    pub line_terminator: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_execution_dir: PathBuf::from("logs/sessions"),
            read_buffer_size: 1024,
            max_concurrent_operations: 16,
            learn_prompts: true,
            prompt_probe_minimal_seconds: 1,
            prompt_probe_seconds_to_timeout: 5,
            substitution_rules: SubstitutionRule::defaults(),
            strip_ansi: true,
            line_terminator: "\n".to_string(),
        }
    }
}

impl EngineConfig {
    /// Reject settings no session could run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> {
            Err(WorkflowError::InvalidConfig {
                message: message.to_string(),
            }
            .into())
        };

        if self.read_buffer_size == 0 {
            return invalid("read_buffer_size must be positive");
        }
        if self.max_concurrent_operations == 0 {
            return invalid("max_concurrent_operations must be positive");
        }
        if self.line_terminator.is_empty() {
            return invalid("line_terminator must not be empty");
        }
        if let Err(e) = compile_rules(&self.substitution_rules) {
            return invalid(&format!("invalid substitution rule: {e}"));
        }
        Ok(())
    }
}
