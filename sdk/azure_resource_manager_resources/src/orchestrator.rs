//! End-to-end deployment workflow with progress reporting.
//!
//! [`DeploymentOrchestrator`] drives the proxies in [`crate::resource_group`],
//! [`crate::deployment`] and [`crate::deployment_operation`]: it makes sure
//! the target resource group exists, validates and submits the deployment, and
//! polls it until it reaches a terminal state while reporting each resource's
//! progress to the progress and error sinks.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_resource_manager_core::client::ArmClient;
//! use azure_resource_manager_resources::deployment::DeploymentRequest;
//! use azure_resource_manager_resources::orchestrator::DeploymentOrchestrator;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(client: &ArmClient) -> azure_resource_manager_core::error::ArmResult<()> {
//! let orchestrator = DeploymentOrchestrator::new(client)
//!     .on_progress(|line| println!("{line}"))
//!     .on_error(|line| eprintln!("{line}"));
//!
//! let request = DeploymentRequest::builder()
//!     .resource_group("my-rg")
//!     .template_file("azuredeploy.json")
//!     .parameters_file("azuredeploy.parameters.json")
//!     .build()?;
//!
//! let summary = orchestrator
//!     .execute_deployment(&request, Some("westeurope"), Duration::from_secs(5), &CancellationToken::new())
//!     .await?;
//! println!("{} finished: {:?}", summary.deployment_name, summary.provisioning_state);
//! # Ok(())
//! # }
//! ```

use azure_resource_manager_core::client::ArmClient;
use azure_resource_manager_core::error::{ArmError, ArmResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::deployment::{self, DeploymentExtended, DeploymentHandle, DeploymentRequest, ValidationResult};
use crate::deployment_operation::{self, DeploymentOperation};
use crate::models::EXPAND_TIMES;
use crate::projection::{DeploymentSummary, Projection, ResourceGroupSummary, ScopedDeployment};
use crate::reporter::{ReportLine, StatusTracker};
use crate::resource_group::{self, ResourceGroup, ResourceGroupCreateRequest, ResourceGroupFilter};

/// Receives one formatted line at a time.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Line emitted when validation reports no errors.
pub const TEMPLATE_VALID: &str = "Template is valid.";

/// Runs deployments against one [`ArmClient`].
pub struct DeploymentOrchestrator<'a> {
    client: &'a ArmClient,
    progress: LineSink,
    error: LineSink,
    group_projection: Projection<ResourceGroup, ResourceGroupSummary>,
    deployment_projection: Projection<ScopedDeployment, DeploymentSummary>,
}

impl<'a> DeploymentOrchestrator<'a> {
    /// Create an orchestrator whose sinks forward to `tracing` at `info` and
    /// `error` level.
    pub fn new(client: &'a ArmClient) -> Self {
        Self {
            client,
            progress: Arc::new(|line: &str| tracing::info!("{line}")),
            error: Arc::new(|line: &str| tracing::error!("{line}")),
            group_projection: ResourceGroupSummary::projection(),
            deployment_projection: DeploymentSummary::projection(),
        }
    }

    /// Set the progress sink.
    pub fn on_progress(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress = Arc::new(sink);
        self
    }

    /// Set the error sink.
    pub fn on_error(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error = Arc::new(sink);
        self
    }

    /// Replace the resource group summary projection.
    pub fn resource_group_projection(
        mut self,
        projection: Projection<ResourceGroup, ResourceGroupSummary>,
    ) -> Self {
        self.group_projection = projection;
        self
    }

    /// Replace the deployment summary projection.
    pub fn deployment_projection(
        mut self,
        projection: Projection<ScopedDeployment, DeploymentSummary>,
    ) -> Self {
        self.deployment_projection = projection;
        self
    }

    fn emit(&self, line: ReportLine) {
        match line {
            ReportLine::Progress(text) => (self.progress)(&text),
            ReportLine::Error(text) => (self.error)(&text),
        }
    }

    fn summarize(&self, resource_group: &str, deployment: DeploymentExtended) -> DeploymentSummary {
        self.deployment_projection.apply(&ScopedDeployment {
            resource_group: resource_group.to_string(),
            deployment,
        })
    }

    /// Return the named resource group, creating it in `location` if it does
    /// not exist.
    ///
    /// An existing group is returned as is; its location and tags are never
    /// updated.
    ///
    /// # Errors
    ///
    /// [`ArmError::Builder`] if the group is absent and no location was
    /// given, [`ArmError::ResourceGroup`] wrapping the service error if the
    /// creation is rejected.
    #[tracing::instrument(
        name = "arm::orchestrator::create_or_get_resource_group",
        skip(self),
        fields(resource_group = %name)
    )]
    pub async fn create_or_get_resource_group(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> ArmResult<ResourceGroup> {
        if resource_group::check_existence(self.client, name).await? {
            tracing::debug!("resource group exists");
            return resource_group::get(self.client, name, Some(EXPAND_TIMES)).await;
        }

        let location = location.filter(|l| !l.trim().is_empty()).ok_or_else(|| {
            ArmError::Builder(format!(
                "location is required to create resource group '{name}'"
            ))
        })?;
        let request = ResourceGroupCreateRequest::builder()
            .location(location)
            .build()?;

        resource_group::create_or_update(self.client, name, &request)
            .await
            .map_err(|source| ArmError::ResourceGroup {
                name: name.to_string(),
                source: Box::new(source),
            })
    }

    /// Validate a deployment. Emits [`TEMPLATE_VALID`] once when no errors
    /// were reported; errors are returned as data.
    #[tracing::instrument(
        name = "arm::orchestrator::validate_deployment",
        skip(self, request),
        fields(resource_group = %request.resource_group, deployment = %request.deployment_name)
    )]
    pub async fn validate_deployment(&self, request: &DeploymentRequest) -> ArmResult<ValidationResult> {
        let result = deployment::validate(self.client, request).await?;

        for diagnostic in &result.diagnostics {
            tracing::warn!(severity = %diagnostic.level, code = %diagnostic.code, "{}", diagnostic.message);
        }

        if result.is_valid() {
            (self.progress)(TEMPLATE_VALID);
        } else {
            for error in &result.errors {
                tracing::debug!(%error, "template validation error");
            }
        }
        Ok(result)
    }

    /// Submit a deployment and return a handle for polling.
    #[tracing::instrument(
        name = "arm::orchestrator::submit_deployment",
        skip(self, request),
        fields(resource_group = %request.resource_group, deployment = %request.deployment_name)
    )]
    pub async fn submit_deployment(&self, request: &DeploymentRequest) -> ArmResult<DeploymentHandle> {
        let submitted = deployment::begin_create_or_update(self.client, request).await?;

        let handle = DeploymentHandle {
            resource_group: request.resource_group.clone(),
            deployment_name: submitted
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| request.deployment_name.clone()),
            correlation_id: submitted.correlation_id().map(str::to_string),
        };

        tracing::debug!(
            deployment = %handle.deployment_name,
            correlation_id = ?handle.correlation_id,
            "deployment submitted"
        );
        Ok(handle)
    }

    async fn fetch_snapshot(
        &self,
        handle: &DeploymentHandle,
    ) -> ArmResult<(Option<DeploymentExtended>, Vec<DeploymentOperation>)> {
        let group = &handle.resource_group;
        let name = &handle.deployment_name;

        let deployment = match deployment::get(self.client, group, name).await {
            Ok(deployment) => Some(deployment),
            Err(e) if e.is_not_found() => {
                tracing::trace!("deployment not visible yet");
                None
            }
            Err(e) => return Err(e),
        };

        let operations = match deployment_operation::list(self.client, group, name).await {
            Ok(operations) => operations,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        Ok((deployment, operations))
    }

    /// Poll a submitted deployment until it reaches a terminal state.
    ///
    /// Every operation state change is reported once: failures to the error
    /// sink, everything else to the progress sink. The final deployment is
    /// returned whether it succeeded, failed or was cancelled remotely.
    ///
    /// # Errors
    ///
    /// [`ArmError::Cancelled`] as soon as `cancel` fires. No line is emitted
    /// after that.
    #[tracing::instrument(
        name = "arm::orchestrator::poll_until_terminal",
        skip(self, handle, cancel),
        fields(resource_group = %handle.resource_group, deployment = %handle.deployment_name)
    )]
    pub async fn poll_until_terminal(
        &self,
        handle: &DeploymentHandle,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> ArmResult<DeploymentExtended> {
        let mut tracker = StatusTracker::new();
        let mut last_rank = None;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ArmError::Cancelled);
            }
            attempt += 1;

            let (deployment, operations) = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ArmError::Cancelled),
                snapshot = self.fetch_snapshot(handle) => snapshot?,
            };

            tracing::trace!(attempt, operations = operations.len(), "poll");

            for operation in &operations {
                if let Some(line) = tracker.observe(operation) {
                    if cancel.is_cancelled() {
                        return Err(ArmError::Cancelled);
                    }
                    self.emit(line);
                }
            }

            if let Some(deployment) = deployment {
                if let Some(state) = deployment.provisioning_state() {
                    let rank = state.rank();
                    if let (Some(previous), Some(current)) = (last_rank, rank) {
                        if current < previous {
                            tracing::warn!(%state, "deployment state went backwards");
                        }
                    }
                    last_rank = rank.or(last_rank);

                    if state.is_terminal() {
                        tracing::debug!(%state, attempt, "deployment reached terminal state");
                        return Ok(deployment);
                    }
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ArmError::Cancelled),
                () = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// Ask the service to cancel a deployment. Not retried.
    #[tracing::instrument(
        name = "arm::orchestrator::cancel_deployment",
        skip(self),
        fields(resource_group = %resource_group, deployment = %name)
    )]
    pub async fn cancel_deployment(&self, resource_group: &str, name: &str) -> ArmResult<()> {
        deployment::cancel(self.client, resource_group, name).await
    }

    /// Run a deployment end to end: create or get the resource group,
    /// validate, submit and poll.
    ///
    /// A deployment that ends `Failed` is not an error here; its failures
    /// have gone to the error sink and the summary carries the state.
    ///
    /// # Errors
    ///
    /// [`ArmError::TemplateValidation`] when validation reports errors, in
    /// which case nothing is submitted.
    #[tracing::instrument(
        name = "arm::orchestrator::execute_deployment",
        skip(self, request, cancel),
        fields(resource_group = %request.resource_group, deployment = %request.deployment_name)
    )]
    pub async fn execute_deployment(
        &self,
        request: &DeploymentRequest,
        location: Option<&str>,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> ArmResult<DeploymentSummary> {
        self.create_or_get_resource_group(&request.resource_group, location)
            .await?;

        let validation = self.validate_deployment(request).await?;
        if !validation.is_valid() {
            return Err(ArmError::TemplateValidation(validation.errors));
        }

        let handle = self.submit_deployment(request).await?;
        let deployment = self.poll_until_terminal(&handle, poll_interval, cancel).await?;

        Ok(self.summarize(&handle.resource_group, deployment))
    }

    /// Cancel the named deployment, or the first deployment of the group that
    /// is still in progress when no name is given.
    ///
    /// # Errors
    ///
    /// [`ArmError::NotFound`] when there is no in-progress deployment to cancel.
    #[tracing::instrument(
        name = "arm::orchestrator::cancel_active_deployment",
        skip(self),
        fields(resource_group = %resource_group)
    )]
    pub async fn cancel_active_deployment(
        &self,
        resource_group: &str,
        name: Option<&str>,
    ) -> ArmResult<DeploymentSummary> {
        let candidate = match name {
            Some(name) => Some(deployment::get(self.client, resource_group, name).await?),
            None => deployment::list(self.client, resource_group, None)
                .await?
                .into_iter()
                .find(|d| d.provisioning_state().is_some_and(|s| !s.is_terminal())),
        };

        let Some(target) = candidate.filter(|d| d.provisioning_state().is_none_or(|s| !s.is_terminal()))
        else {
            return Err(ArmError::not_found(format!(
                "no deployment in progress in resource group '{resource_group}'"
            )));
        };

        let target_name = target
            .name
            .clone()
            .or_else(|| name.map(str::to_string))
            .unwrap_or_default();
        self.cancel_deployment(resource_group, &target_name).await?;

        Ok(self.summarize(resource_group, target))
    }

    /// Look up resource groups by name, or list them with an optional tag
    /// filter.
    #[tracing::instrument(
        name = "arm::orchestrator::filter_resource_groups",
        skip(self, tag),
        fields(resource_group = ?name)
    )]
    pub async fn filter_resource_groups(
        &self,
        name: Option<&str>,
        tag: Option<&ResourceGroupFilter>,
    ) -> ArmResult<Vec<ResourceGroupSummary>> {
        let groups = match name {
            Some(name) => {
                let group = resource_group::get(self.client, name, Some(EXPAND_TIMES)).await?;
                if tag.is_none_or(|f| f.matches(&group.tags)) {
                    vec![group]
                } else {
                    Vec::new()
                }
            }
            None => resource_group::list(self.client, tag).await?,
        };

        Ok(groups
            .iter()
            .map(|group| self.group_projection.apply(group))
            .collect())
    }

    /// Delete a resource group and everything in it.
    ///
    /// # Errors
    ///
    /// [`ArmError::NotFound`] when the group does not exist.
    #[tracing::instrument(
        name = "arm::orchestrator::delete_resource_group",
        skip(self),
        fields(resource_group = %name)
    )]
    pub async fn delete_resource_group(&self, name: &str) -> ArmResult<()> {
        if !resource_group::check_existence(self.client, name).await? {
            return Err(ArmError::not_found(format!(
                "resource group '{name}' does not exist"
            )));
        }
        resource_group::delete(self.client, name).await
    }

    /// Look up a deployment by name, or list the group's deployments.
    #[tracing::instrument(
        name = "arm::orchestrator::filter_deployments",
        skip(self),
        fields(resource_group = %resource_group)
    )]
    pub async fn filter_deployments(
        &self,
        resource_group: &str,
        name: Option<&str>,
    ) -> ArmResult<Vec<DeploymentSummary>> {
        let deployments = match name {
            Some(name) => vec![deployment::get(self.client, resource_group, name).await?],
            None => deployment::list(self.client, resource_group, None).await?,
        };

        Ok(deployments
            .into_iter()
            .map(|d| self.summarize(resource_group, d))
            .collect())
    }
}

impl std::fmt::Debug for DeploymentOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentOrchestrator")
            .field("client", self.client)
            .finish_non_exhaustive()
    }
}
