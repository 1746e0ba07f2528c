//! Common types shared across all Resource Manager crates.

use crate::error::{ArmError, ArmResult};
use serde::{Deserialize, Serialize};

/// One page of a collection returned by a list operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,

    /// Absolute URL of the next page, absent on the last page.
    pub next_link: Option<String>,
}

/// Error details in the standard ARM error envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    /// The error code.
    #[serde(default)]
    pub code: String,

    /// The error message.
    #[serde(default)]
    pub message: String,

    /// The error target.
    pub target: Option<String>,

    /// Nested errors.
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

impl ErrorDetail {
    /// Flatten this error and all nested details, depth first.
    ///
    /// Wrapper errors that only point at their details (`InvalidTemplateDeployment`
    /// with a generic message) are still included so the code is not lost.
    pub fn flatten(&self) -> Vec<&ErrorDetail> {
        let mut out = vec![self];
        for detail in &self.details {
            out.extend(detail.flatten());
        }
        out
    }
}

/// The `{"error": {...}}` envelope ARM uses for failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error object.
    pub error: Option<ErrorDetail>,
}

/// Lifecycle stage reported by the service for a resource or deployment.
///
/// States outside the deployment lifecycle (`Creating`, `Deleting`, ...) are
/// carried verbatim in [`ProvisioningState::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProvisioningState {
    /// The request was accepted and is queued.
    Accepted,
    /// The operation is in progress.
    Running,
    /// The operation completed successfully.
    Succeeded,
    /// The operation failed.
    Failed,
    /// The operation was cancelled.
    Canceled,
    /// Any other state string.
    Other(String),
}

impl ProvisioningState {
    /// The state as reported on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Accepted => "Accepted",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Other(s) => s,
        }
    }

    /// Returns `true` for `Succeeded`, `Failed` and `Canceled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Position in the Accepted → Running → terminal sequence, if the state
    /// belongs to it.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Accepted => Some(0),
            Self::Running => Some(1),
            Self::Succeeded | Self::Failed | Self::Canceled => Some(2),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for ProvisioningState {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "accepted" => Self::Accepted,
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for ProvisioningState {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ProvisioningState> for String {
    fn from(state: ProvisioningState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read the discriminator of a polymorphic payload.
///
/// Decoders call this first and then dispatch on the returned tag, answering
/// [`unknown_variant`] for tags they do not recognise.
pub fn discriminator<'a>(value: &'a serde_json::Value, field: &str) -> ArmResult<&'a str> {
    value
        .get(field)
        .and_then(|tag| tag.as_str())
        .ok_or_else(|| ArmError::UnknownVariant {
            field: field.to_string(),
            tag: String::new(),
        })
}

/// Error for a discriminator value with no matching variant.
pub fn unknown_variant(field: &str, tag: &str) -> ArmError {
    ArmError::UnknownVariant {
        field: field.to_string(),
        tag: tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_state_known_values() {
        let state: ProvisioningState = serde_json::from_str("\"Succeeded\"").unwrap();
        assert_eq!(state, ProvisioningState::Succeeded);
        assert!(state.is_terminal());

        let state: ProvisioningState = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(state, ProvisioningState::Running);
        assert!(!state.is_terminal());
    }

    #[test]
    fn provisioning_state_keeps_unknown_values() {
        let state: ProvisioningState = serde_json::from_str("\"Deleting\"").unwrap();
        assert_eq!(state, ProvisioningState::Other("Deleting".into()));
        assert_eq!(state.as_str(), "Deleting");
        assert_eq!(state.rank(), None);
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"Deleting\"");
    }

    #[test]
    fn provisioning_state_rank_is_forward_only() {
        assert!(ProvisioningState::Accepted.rank() < ProvisioningState::Running.rank());
        assert!(ProvisioningState::Running.rank() < ProvisioningState::Failed.rank());
        assert_eq!(
            ProvisioningState::Succeeded.rank(),
            ProvisioningState::Canceled.rank()
        );
    }

    #[test]
    fn page_deserializes_without_next_link() {
        let page: Page<u32> = serde_json::from_str(r#"{"value":[1,2]}"#).unwrap();
        assert_eq!(page.value, vec![1, 2]);
        assert!(page.next_link.is_none());
    }

    #[test]
    fn error_detail_flattens_nested_details() {
        let response: ErrorResponse = serde_json::from_value(serde_json::json!({
            "error": {
                "code": "InvalidTemplateDeployment",
                "message": "The template deployment failed.",
                "details": [
                    {"code": "PreflightValidationCheckFailed", "message": "Preflight failed",
                     "details": [{"code": "StorageAccountAlreadyTaken", "message": "taken"}]}
                ]
            }
        }))
        .unwrap();

        let codes: Vec<&str> = response
            .error
            .as_ref()
            .unwrap()
            .flatten()
            .iter()
            .map(|e| e.code.as_str())
            .collect();
        assert_eq!(
            codes,
            vec![
                "InvalidTemplateDeployment",
                "PreflightValidationCheckFailed",
                "StorageAccountAlreadyTaken"
            ]
        );
    }

    #[test]
    fn discriminator_reads_tag() {
        let value = serde_json::json!({"type": "LastSuccessful"});
        assert_eq!(discriminator(&value, "type").unwrap(), "LastSuccessful");
    }

    #[test]
    fn discriminator_missing_is_unknown_variant() {
        let value = serde_json::json!({"kind": "x"});
        assert!(matches!(
            discriminator(&value, "type").unwrap_err(),
            ArmError::UnknownVariant { .. }
        ));
    }
}
