//! Result retention directives and the values they produce.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::logic::ExpressionResult;

/// Where a resolved command value goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetentionMode {
    /// Not retained.
    #[default]
    None,
    /// Pushed onto the session variable stack of `name`.
    Variable,
    /// Written to `<session dir>/<name>` by the file writer.
    File,
    /// Sent to the results producer as soon as it resolves.
    DatabaseImmediate,
    /// Collected and reported with the operation result.
    DatabaseEventual,
}

/// Type hint for a retained value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    Path,
}

/// How a command keeps its resolved value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultRetention {
    pub retention_mode: RetentionMode,
    pub data_type: DataType,
    /// May contain `$variable` references.
    pub name: String,
    /// Preset value; when empty the command output is retained instead.
    pub value: String,
    /// Replace the parent scope's value instead of shadowing it.
    pub overwrite_parent: bool,
}

impl ResultRetention {
    pub fn new(retention_mode: RetentionMode, name: impl Into<String>) -> Self {
        Self {
            retention_mode,
            name: name.into(),
            ..Default::default()
        }
    }

    /// A variable frame holding `value`.
    pub fn variable(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(RetentionMode::Variable, name).with_value(value)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_overwrite_parent(mut self, overwrite_parent: bool) -> Self {
        self.overwrite_parent = overwrite_parent;
        self
    }

    pub fn is_retained(&self) -> bool {
        self.retention_mode != RetentionMode::None
    }
}

/// A value reported to the results store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseVariable {
    pub data_type: DataType,
    pub name: String,
    pub value: String,
    pub collected_at: SystemTime,
}

impl DatabaseVariable {
    pub fn new(data_type: DataType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            data_type,
            name: name.into(),
            value: value.into(),
            collected_at: SystemTime::now(),
        }
    }
}

/// Final result of one operation.
///
/// Database-eventual variables collected before a failure are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub expression_result: ExpressionResult,
    pub database_variables: Vec<DatabaseVariable>,
}

impl OperationResult {
    pub fn new(expression_result: ExpressionResult) -> Self {
        Self {
            expression_result,
            database_variables: Vec::new(),
        }
    }

    pub fn with_database_variables(mut self, variables: Vec<DatabaseVariable>) -> Self {
        self.database_variables = variables;
        self
    }

    pub fn is_success(&self) -> bool {
        self.expression_result.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.expression_result.is_failure()
    }
}
