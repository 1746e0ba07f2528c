//! Turns deployment operation snapshots into human-readable lines.
//!
//! Progress lines look like
//! `Resource Microsoft.Storage/storageAccounts 'mystore' provisioning status is running`,
//! failures like
//! `Resource Microsoft.Web 'mysite' failed with message '<message>'`.

use azure_resource_manager_core::models::ProvisioningState;
use serde_json::Value;
use std::collections::HashMap;

use crate::deployment_operation::DeploymentOperation;

/// A line to deliver to one of the two sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    /// Goes to the progress sink.
    Progress(String),
    /// Goes to the error sink.
    Error(String),
}

/// `Resource {type} '{name}' provisioning status is {state}`
pub fn format_progress(resource_type: &str, resource_name: &str, state: &ProvisioningState) -> String {
    format!(
        "Resource {resource_type} '{resource_name}' provisioning status is {}",
        state.as_str().to_lowercase()
    )
}

/// `Resource {type} '{name}' failed with message '{message}'`
pub fn format_failure_message(resource_type: &str, resource_name: &str, message: &str) -> String {
    format!("Resource {resource_type} '{resource_name}' failed with message '{message}'")
}

/// Render the error line for a failed operation.
///
/// * No payload: the generic line with the state text.
/// * A payload shaped like an error object (directly, JSON-encoded in a
///   string, or under a nested `error` key): the generic line with its
///   `message`, or with the raw payload when it has a code but no message.
/// * Anything else: the payload text as is.
pub fn format_failure(resource_type: &str, resource_name: &str, payload: Option<&Value>) -> String {
    let payload = match payload {
        None | Some(Value::Null) => {
            return format_failure_message(
                resource_type,
                resource_name,
                ProvisioningState::Failed.as_str(),
            )
        }
        Some(payload) => payload,
    };

    let (raw, parsed) = match payload {
        Value::String(text) => (text.clone(), serde_json::from_str::<Value>(text).ok()),
        other => (other.to_string(), Some(other.clone())),
    };

    match parsed.as_ref().and_then(error_shape) {
        Some(shape) => format_failure_message(
            resource_type,
            resource_name,
            shape.message.as_deref().unwrap_or(&raw),
        ),
        None => raw,
    }
}

struct ErrorShape {
    message: Option<String>,
}

fn field<'a>(object: &'a serde_json::Map<String, Value>, name: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn error_shape(value: &Value) -> Option<ErrorShape> {
    let object = value.as_object()?;

    if let Some(nested) = field(object, "error") {
        if let Some(shape) = error_shape(nested) {
            return Some(shape);
        }
    }

    let code = field(object, "code");
    let message = field(object, "message").and_then(Value::as_str);
    if code.is_none() && message.is_none() {
        return None;
    }

    Some(ErrorShape {
        message: message.filter(|m| !m.is_empty()).map(str::to_string),
    })
}

/// Remembers the last state reported for each operation so every transition
/// is reported once.
#[derive(Debug, Default)]
pub struct StatusTracker {
    last_seen: HashMap<String, ProvisioningState>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the line to emit for `operation`, or `None` if its state has
    /// already been reported or it carries nothing to report.
    pub fn observe(&mut self, operation: &DeploymentOperation) -> Option<ReportLine> {
        let key = operation.key()?;
        let state = operation.provisioning_state()?;
        let Some(target) = operation.target_resource() else {
            tracing::trace!(operation = key, "skipping operation without target resource");
            return None;
        };

        if self.last_seen.get(key) == Some(state) {
            return None;
        }
        self.last_seen.insert(key.to_string(), state.clone());

        let line = if *state == ProvisioningState::Failed {
            ReportLine::Error(format_failure(
                &target.resource_type,
                &target.resource_name,
                operation.status_message(),
            ))
        } else {
            ReportLine::Progress(format_progress(
                &target.resource_type,
                &target.resource_name,
                state,
            ))
        };
        Some(line)
    }
}
