//! Flat summaries of service objects with optional caller hooks.
//!
//! A [`Projection`] maps a source object to a summary with a default mapping.
//! A `before` hook may supply the whole result and skip the default mapping.
//! An `after` hook may adjust the mapped result.

use azure_resource_manager_core::models::ProvisioningState;
use std::collections::BTreeMap;

use crate::deployment::{DeploymentExtended, DeploymentMode};
use crate::models::resource_group_from_id;
use crate::resource_group::ResourceGroup;

type BeforeHook<S, T> = Box<dyn Fn(&S) -> Option<T> + Send + Sync>;
type AfterHook<S, T> = Box<dyn Fn(&S, &mut T) + Send + Sync>;

/// Maps `S` to `T`, with optional override hooks.
pub struct Projection<S, T> {
    map: fn(&S) -> T,
    before: Option<BeforeHook<S, T>>,
    after: Option<AfterHook<S, T>>,
}

impl<S, T> Projection<S, T> {
    /// A projection using `map` and no hooks.
    pub fn new(map: fn(&S) -> T) -> Self {
        Self {
            map,
            before: None,
            after: None,
        }
    }

    /// Run `hook` first. If it returns `Some`, that value is the result and
    /// the `after` hook is skipped.
    pub fn before(mut self, hook: impl Fn(&S) -> Option<T> + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    /// Run `hook` on the mapped result.
    pub fn after(mut self, hook: impl Fn(&S, &mut T) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(hook));
        self
    }

    pub fn apply(&self, source: &S) -> T {
        if let Some(result) = self.before.as_ref().and_then(|hook| hook(source)) {
            return result;
        }

        let mut result = (self.map)(source);
        if let Some(hook) = &self.after {
            hook(source, &mut result);
        }
        result
    }
}

impl<S, T> std::fmt::Debug for Projection<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projection")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Summary of a resource group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceGroupSummary {
    pub resource_group_name: String,
    pub location: String,
    pub provisioning_state: Option<ProvisioningState>,
    pub tags: BTreeMap<String, String>,
    pub resource_id: Option<String>,
}

impl ResourceGroupSummary {
    /// Default projection of a [`ResourceGroup`].
    pub fn projection() -> Projection<ResourceGroup, ResourceGroupSummary> {
        Projection::new(Self::from_resource_group)
    }

    fn from_resource_group(group: &ResourceGroup) -> Self {
        Self {
            resource_group_name: group.name.clone().unwrap_or_default(),
            location: group.location.clone(),
            provisioning_state: group.provisioning_state().cloned(),
            tags: group.tags.clone(),
            resource_id: group.id.clone(),
        }
    }
}

/// A deployment together with the resource group it was looked up in.
#[derive(Debug, Clone)]
pub struct ScopedDeployment {
    pub resource_group: String,
    pub deployment: DeploymentExtended,
}

/// Summary of a deployment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentSummary {
    pub deployment_name: String,
    pub resource_group_name: String,
    pub provisioning_state: Option<ProvisioningState>,
    pub correlation_id: Option<String>,
    pub timestamp: Option<String>,
    pub mode: Option<DeploymentMode>,
    pub template_link: Option<String>,
    pub parameters: Option<serde_json::Value>,
    pub outputs: Option<serde_json::Value>,
}

impl DeploymentSummary {
    /// Default projection of a [`ScopedDeployment`].
    pub fn projection() -> Projection<ScopedDeployment, DeploymentSummary> {
        Projection::new(Self::from_scoped)
    }

    fn from_scoped(scoped: &ScopedDeployment) -> Self {
        let deployment = &scoped.deployment;
        let properties = deployment.properties.clone().unwrap_or_default();

        // The id is authoritative when present.
        let resource_group_name = deployment
            .id
            .as_deref()
            .and_then(resource_group_from_id)
            .unwrap_or(&scoped.resource_group)
            .to_string();

        Self {
            deployment_name: deployment.name.clone().unwrap_or_default(),
            resource_group_name,
            provisioning_state: properties.provisioning_state,
            correlation_id: properties.correlation_id,
            timestamp: properties.timestamp,
            mode: properties.mode,
            template_link: properties.template_link.map(|l| l.uri),
            parameters: properties.parameters,
            outputs: properties.outputs,
        }
    }
}
