//! Outcome of resolving an expression, command, block or operation.

use serde::{Deserialize, Serialize};

/// Fixed diagnostic messages carried by engine-generated results.
pub mod messages {
    pub const COMMAND_DID_NOT_REACH_OUTCOME: &str = "Command did not reach it's expected outcome";
    pub const EXPECTED_OUTCOME_NOT_NUMERIC: &str = "Expected outcome is not a number";
    pub const COMMAND_DID_NOT_MATCH_CONDITIONS: &str =
        "Command did not match it's execution conditions";
    pub const INVALID_COMMAND_PARAMETERS: &str = "Command has invalid parameters";
    pub const INVALID_EXECUTION_BLOCK: &str = "Execution block is not a valid block";
    pub const OPERATION_TERMINATED: &str = "Operation has been terminated externally";
    pub const UNSUPPORTED_BINARY_RELATION: &str =
        "Expected outcome has an unsupported binary relation";
    pub const TIMEOUT_IN_COMMAND: &str = "Command did not return within it's specified time limit";
}

/// What a resolved expression means for the node that owns it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    #[default]
    Success,
    Failure,
    Skip,
}

/// Result of resolving a logical expression.
///
/// `resolved` says whether the expression turned out true; `outcome` says
/// what that means for the command. A connector can therefore resolve true
/// and still carry a FAILURE outcome, e.g. an "Authentication failed" match.
///
/// Equality compares `resolved` and `outcome` only, never the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionResult {
    pub resolved: bool,
    pub outcome: ResultStatus,
    pub message: String,
}

impl ExpressionResult {
    pub fn new(resolved: bool, outcome: ResultStatus, message: impl Into<String>) -> Self {
        Self {
            resolved,
            outcome,
            message: message.into(),
        }
    }

    /// Generic success: resolved, SUCCESS, no message.
    pub fn default_outcome() -> Self {
        Self::new(true, ResultStatus::Success, "")
    }

    /// A node that was deliberately not run.
    pub fn skip() -> Self {
        Self::new(true, ResultStatus::Skip, "")
    }

    /// Unresolved FAILURE carrying a diagnostic.
    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::new(false, ResultStatus::Failure, message)
    }

    pub fn with_resolved(mut self, resolved: bool) -> Self {
        self.resolved = resolved;
        self
    }

    pub fn with_outcome(mut self, outcome: ResultStatus) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ResultStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == ResultStatus::Failure
    }

    pub fn is_skip(&self) -> bool {
        self.outcome == ResultStatus::Skip
    }

    /// Message and outcome match too.
    pub fn strong_eq(&self, other: &Self) -> bool {
        self == other && self.message == other.message
    }
}

impl Default for ExpressionResult {
    /// The pristine embedded result of a flow connector: unresolved SUCCESS.
    fn default() -> Self {
        Self::new(false, ResultStatus::Success, "")
    }
}

impl PartialEq for ExpressionResult {
    fn eq(&self, other: &Self) -> bool {
        self.resolved == other.resolved && self.outcome == other.outcome
    }
}

impl Eq for ExpressionResult {}

impl std::fmt::Display for ExpressionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} (resolved: {})", self.outcome, self.resolved)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_message() {
        let a = ExpressionResult::execution_error("one");
        let b = ExpressionResult::execution_error("two");
        assert_eq!(a, b);
        assert!(!a.strong_eq(&b));
    }

    #[test]
    fn test_constructors() {
        assert!(ExpressionResult::default_outcome().resolved);
        assert!(ExpressionResult::default_outcome().is_success());
        assert!(ExpressionResult::skip().is_skip());

        let err = ExpressionResult::execution_error(messages::TIMEOUT_IN_COMMAND);
        assert!(!err.resolved);
        assert!(err.is_failure());
        assert_eq!(err.message, messages::TIMEOUT_IN_COMMAND);

        let pristine = ExpressionResult::default();
        assert!(!pristine.resolved);
        assert!(pristine.is_success());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&ResultStatus::Failure).unwrap();
        assert_eq!(json, "\"FAILURE\"");
    }
}
