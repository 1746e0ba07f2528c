//! Per-resource operations of a deployment.

use azure_resource_manager_core::client::ArmClient;
use azure_resource_manager_core::error::ArmResult;
use azure_resource_manager_core::models::ProvisioningState;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{deployment_path, require_name};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One resource-level step of a deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOperation {
    /// Fully qualified id of the operation.
    pub id: Option<String>,

    /// Operation id, stable across polls.
    pub operation_id: Option<String>,

    pub properties: Option<DeploymentOperationProperties>,
}

/// Properties of a deployment operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOperationProperties {
    pub provisioning_state: Option<ProvisioningState>,

    /// `Create`, `Delete`, `Read`, `EvaluateDeploymentOutput`, ...
    pub provisioning_operation: Option<String>,

    pub timestamp: Option<String>,

    pub duration: Option<String>,

    /// HTTP status of the underlying resource operation, e.g. `Conflict`.
    pub status_code: Option<String>,

    /// Payload describing the outcome. Usually an error object, sometimes a
    /// JSON-encoded string or plain text.
    pub status_message: Option<Value>,

    pub target_resource: Option<TargetResource>,
}

/// The resource an operation acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResource {
    pub id: Option<String>,

    /// Resource type, e.g. `Microsoft.Storage/storageAccounts`.
    #[serde(default)]
    pub resource_type: String,

    #[serde(default)]
    pub resource_name: String,
}

impl DeploymentOperation {
    /// The provisioning state, if the service reported one.
    pub fn provisioning_state(&self) -> Option<&ProvisioningState> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_ref())
    }

    /// The target resource, if any.
    pub fn target_resource(&self) -> Option<&TargetResource> {
        self.properties
            .as_ref()
            .and_then(|p| p.target_resource.as_ref())
    }

    /// The status message payload, if any.
    pub fn status_message(&self) -> Option<&Value> {
        self.properties
            .as_ref()
            .and_then(|p| p.status_message.as_ref())
    }

    /// Key identifying this operation across polls.
    pub fn key(&self) -> Option<&str> {
        self.operation_id.as_deref().or(self.id.as_deref())
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// List every operation of a deployment, following every page.
///
/// # Tracing
///
/// Emits a span named `arm::deployment_operations::list` with fields
/// `resource_group` and `deployment`.
#[tracing::instrument(
    name = "arm::deployment_operations::list",
    skip(client),
    fields(resource_group = %resource_group, deployment = %deployment_name)
)]
pub async fn list(
    client: &ArmClient,
    resource_group: &str,
    deployment_name: &str,
) -> ArmResult<Vec<DeploymentOperation>> {
    require_name("deployment name", deployment_name)?;

    let path = format!(
        "{}/operations",
        deployment_path(client, resource_group, deployment_name)
    );
    let operations: Vec<DeploymentOperation> = client.list_all(&path, &[]).await?;

    tracing::trace!(count = operations.len(), "deployment operations listed");
    Ok(operations)
}
