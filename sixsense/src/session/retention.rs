//! Routing a resolved command value to where its `save_to` points.

use log::{error, trace};

use super::boundary::filter_file_output;
use super::{Session, SessionState};
use crate::engine::EngineEvent;
use crate::logic::evaluate_against_dynamic_fields;
use crate::model::{Command, DataType, DatabaseVariable, PipeContext, Retainable, RetentionMode};

impl Session {
    /// Retain `output` (or the preset value) of a successful command.
    ///
    /// The command's template is never touched; a copy of its retention
    /// is piped, substituted and dispatched by mode.
    pub(super) fn retain_result(
        &self,
        state: &mut SessionState,
        command: &Command,
        output: &str,
        context: &PipeContext<'_>,
    ) {
        if !command.save_to().is_retained() {
            return;
        }

        let mut retention = command.save_to().clone();
        let value = if retention.value.is_empty() {
            output.to_string()
        } else {
            retention.value.clone()
        };
        let value = command
            .retention_pipes
            .iter()
            .fold(value, |value, pipe| pipe.pipe_value(&value, context));

        let variables = state.variables.current();
        retention.name = evaluate_against_dynamic_fields(&retention.name, &variables);
        retention.value = evaluate_against_dynamic_fields(&value, &variables);

        match retention.retention_mode {
            RetentionMode::None => return,
            RetentionMode::Variable => {
                trace!(
                    "Session {} retained {} = {:?}",
                    self.short_id(),
                    retention.name,
                    retention.value
                );
                state.variables.retain(retention.clone());
            }
            RetentionMode::File => {
                retention.value =
                    filter_file_output(&retention.value, context.prompt, context.command);

                let files = self.services.files.clone();
                let short_id = self.short_id();
                let name = retention.name.clone();
                let value = retention.value.clone();
                tokio::spawn(async move {
                    if let Err(e) = files.write(&short_id, &name, &value).await {
                        error!("Session {} failed to save file {}: {}", short_id, name, e);
                    }
                });

                let location = self
                    .services
                    .config
                    .session_execution_dir
                    .join(self.short_id())
                    .join(&retention.name);
                state.database_variables.push(DatabaseVariable::new(
                    DataType::Path,
                    retention.name.clone(),
                    location.display().to_string(),
                ));
            }
            RetentionMode::DatabaseImmediate => {
                self.services.results.produce_retention_result(
                    self.operation_id,
                    DatabaseVariable::new(
                        retention.data_type,
                        retention.name.clone(),
                        retention.value.clone(),
                    ),
                );
            }
            RetentionMode::DatabaseEventual => {
                state.database_variables.push(DatabaseVariable::new(
                    retention.data_type,
                    retention.name.clone(),
                    retention.value.clone(),
                ));
            }
        }

        self.emit(EngineEvent::ResultRetained {
            session_id: self.id,
            retention,
        });
    }
}
