//! Shared paths and helpers for the `Microsoft.Resources` provider.

use azure_resource_manager_core::client::ArmClient;
use azure_resource_manager_core::error::{ArmError, ArmResult};

/// `$expand` value requesting group timestamps on GET.
pub(crate) const EXPAND_TIMES: &str = "createdTime,changedTime";

/// Reject empty names before they turn into a malformed path.
pub(crate) fn require_name(kind: &str, value: &str) -> ArmResult<()> {
    if value.trim().is_empty() {
        return Err(ArmError::Builder(format!("{kind} cannot be empty")));
    }
    Ok(())
}

pub(crate) fn resource_groups_path(client: &ArmClient) -> String {
    format!("{}/resourcegroups", client.subscription_path())
}

pub(crate) fn resource_group_path(client: &ArmClient, resource_group: &str) -> String {
    format!("{}/{}", resource_groups_path(client), resource_group)
}

pub(crate) fn deployments_path(client: &ArmClient, resource_group: &str) -> String {
    format!(
        "{}/providers/Microsoft.Resources/deployments",
        resource_group_path(client, resource_group)
    )
}

pub(crate) fn deployment_path(client: &ArmClient, resource_group: &str, name: &str) -> String {
    format!("{}/{}", deployments_path(client, resource_group), name)
}

/// Extract the resource group segment from a resource id such as
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/...`.
pub fn resource_group_from_id(id: &str) -> Option<&str> {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourcegroups") {
            return segments.next().filter(|s| !s.is_empty());
        }
    }
    None
}
