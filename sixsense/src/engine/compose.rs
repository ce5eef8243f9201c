//! Turning a device list and an operation template into a workflow.

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};

use super::orchestrator::WorkflowReport;
use crate::model::{Operation, OperationResult, ParallelWorkflow, Resettable};

pub const DEVICE_ID_FIELD: &str = "device.internal.id";
pub const DEVICE_HOST_FIELD: &str = "device.host";
pub const DEVICE_USERNAME_FIELD: &str = "device.username";
pub const DEVICE_PASSWORD_FIELD: &str = "device.password";
pub const DEVICE_PORT_FIELD: &str = "device.port";

/// A target device and the credentials its commands may reference.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port: 22,
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// One copy of `template` per device, run in parallel.
///
/// Every copy gets fresh identities throughout its tree and the device's
/// fields, so commands can refer to `$device.host` and friends.
pub fn compose_workflow(devices: &[Device], template: &Operation) -> ParallelWorkflow {
    devices
        .iter()
        .fold(ParallelWorkflow::new(), |workflow, device| {
            let operation = template
                .deep_clone()
                .with_dynamic_field(DEVICE_ID_FIELD, device.id.as_str())
                .with_dynamic_field(DEVICE_HOST_FIELD, device.host.as_str())
                .with_dynamic_field(DEVICE_USERNAME_FIELD, device.username.as_str())
                .with_dynamic_field(DEVICE_PASSWORD_FIELD, device.password.expose_secret())
                .with_dynamic_field(DEVICE_PORT_FIELD, device.port.to_string());
            workflow.add_operation(operation)
        })
}

impl WorkflowReport {
    /// Results of the operations of `workflow`, keyed by device id.
    pub fn per_device(&self, workflow: &ParallelWorkflow) -> IndexMap<String, OperationResult> {
        workflow
            .parallel_operations
            .iter()
            .filter_map(|operation| {
                let device = operation.dynamic_fields.get(DEVICE_ID_FIELD)?;
                let result = self.result(&operation.uuid)?;
                Some((device.clone(), result.clone()))
            })
            .collect()
    }
}
