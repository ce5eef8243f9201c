//! Substitution rules applied to every decoded chunk.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A `pattern -> replacement` rewrite, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub pattern: String,
    pub replacement: String,
}

impl SubstitutionRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Collapse spaces around carriage returns, then normalize line breaks.
    pub fn defaults() -> Vec<SubstitutionRule> {
        vec![
            SubstitutionRule::new(" *\r *", ""),
            SubstitutionRule::new(" *\n *", "\n"),
        ]
    }

    pub fn compile(&self) -> Result<CompiledRule, regex::Error> {
        Ok(CompiledRule {
            pattern: Regex::new(&self.pattern)?,
            replacement: self.replacement.clone(),
        })
    }
}

/// A rule with its regex compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pattern: Regex,
    replacement: String,
}

impl CompiledRule {
    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// Compile rules in order, failing on the first invalid pattern.
pub fn compile_rules(rules: &[SubstitutionRule]) -> Result<Vec<CompiledRule>, regex::Error> {
    rules.iter().map(SubstitutionRule::compile).collect()
}
