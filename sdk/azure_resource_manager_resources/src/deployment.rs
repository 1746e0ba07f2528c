//! Template deployments at resource group scope.
//!
//! A [`DeploymentRequest`] bundles the target resource group, the deployment
//! name and the `properties` body. It is validated with [`validate`], submitted
//! with [`begin_create_or_update`] and then observed with [`get`] and
//! [`crate::deployment_operation::list`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_resource_manager_core::client::ArmClient;
//! use azure_resource_manager_resources::deployment::{self, DeploymentRequest};
//!
//! # async fn example(client: &ArmClient) -> azure_resource_manager_core::error::ArmResult<()> {
//! let request = DeploymentRequest::builder()
//!     .resource_group("my-rg")
//!     .template_link("https://example.com/templates/storage.json")
//!     .parameter("storageAccountName", "mystorage")
//!     .build()?;
//!
//! let result = deployment::validate(client, &request).await?;
//! if result.is_valid() {
//!     deployment::begin_create_or_update(client, &request).await?;
//! }
//! # Ok(())
//! # }
//! ```

use azure_resource_manager_core::client::ArmClient;
use azure_resource_manager_core::error::{ArmError, ArmResult, ValidationError};
use azure_resource_manager_core::models::{
    discriminator, unknown_variant, ErrorDetail, ProvisioningState,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::models::{deployment_path, deployments_path, require_name};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// How the deployment treats resources already in the group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    /// Leave resources not in the template untouched.
    #[default]
    Incremental,
    /// Delete resources not in the template.
    Complete,
}

/// A link to a template or parameters file hosted at a URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLink {
    /// Location of the file.
    pub uri: String,

    /// Expected `contentVersion` of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_version: Option<String>,
}

/// Request/response content the service should log for the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSetting {
    /// `None`, `RequestContent`, `ResponseContent` or
    /// `RequestContent,ResponseContent`.
    pub detail_level: String,
}

/// What the service does when this deployment fails.
///
/// Encoded on the wire as an object tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnErrorDeployment {
    /// Redeploy the last successful deployment in the group.
    LastSuccessful,
    /// Redeploy a named deployment.
    SpecificDeployment {
        /// Deployment to redeploy.
        deployment_name: String,
    },
}

impl OnErrorDeployment {
    const TAG: &'static str = "type";

    /// Decode from the tagged wire form.
    pub fn from_value(value: &Value) -> ArmResult<Self> {
        match discriminator(value, Self::TAG)? {
            "LastSuccessful" => Ok(Self::LastSuccessful),
            "SpecificDeployment" => {
                let deployment_name = value
                    .get("deploymentName")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ArmError::Builder(
                            "SpecificDeployment requires deploymentName".into(),
                        )
                    })?;
                Ok(Self::SpecificDeployment {
                    deployment_name: deployment_name.to_string(),
                })
            }
            other => Err(unknown_variant(Self::TAG, other)),
        }
    }

    /// Encode into the tagged wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::LastSuccessful => serde_json::json!({"type": "LastSuccessful"}),
            Self::SpecificDeployment { deployment_name } => serde_json::json!({
                "type": "SpecificDeployment",
                "deploymentName": deployment_name
            }),
        }
    }
}

impl Serialize for OnErrorDeployment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OnErrorDeployment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// The `properties` object of a deployment PUT or validate body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    /// Inline template content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,

    /// Linked template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_link: Option<ContentLink>,

    /// Inline parameter values, each shaped `{"value": ...}` or `{"reference": ...}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,

    /// Linked parameters file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_link: Option<ContentLink>,

    /// Deployment mode.
    pub mode: DeploymentMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_setting: Option<DebugSetting>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_error_deployment: Option<OnErrorDeployment>,
}

#[derive(Serialize)]
struct DeploymentBody<'a> {
    properties: &'a DeploymentProperties,
}

/// A deployment of one template into one resource group.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRequest {
    /// Target resource group.
    pub resource_group: String,

    /// Deployment name.
    pub deployment_name: String,

    /// Body sent to the service.
    pub properties: DeploymentProperties,
}

#[derive(Debug, Clone)]
enum TemplateSource {
    Inline(Value),
    File(PathBuf),
    Link(ContentLink),
}

#[derive(Debug, Clone)]
enum ParametersSource {
    Inline(Value),
    File(PathBuf),
    Link(ContentLink),
}

/// Builder for [`DeploymentRequest`].
#[derive(Debug, Default)]
pub struct DeploymentRequestBuilder {
    resource_group: Option<String>,
    deployment_name: Option<String>,
    template: Option<TemplateSource>,
    parameters: Option<ParametersSource>,
    parameter_values: Map<String, Value>,
    mode: DeploymentMode,
    debug_setting: Option<DebugSetting>,
    on_error_deployment: Option<OnErrorDeployment>,
}

impl DeploymentRequest {
    /// Create a new builder.
    pub fn builder() -> DeploymentRequestBuilder {
        DeploymentRequestBuilder::default()
    }
}

impl DeploymentRequestBuilder {
    /// Set the target resource group.
    ///
    /// **Required.**
    pub fn resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }

    /// Set the deployment name.
    ///
    /// Defaults to the file stem of the template (`azuredeploy` for
    /// `azuredeploy.json`), or `deployment-<unix seconds>` for inline templates.
    pub fn deployment_name(mut self, name: impl Into<String>) -> Self {
        self.deployment_name = Some(name.into());
        self
    }

    /// Use inline template content.
    pub fn template(mut self, template: Value) -> Self {
        self.template = Some(TemplateSource::Inline(template));
        self
    }

    /// Read the template from a local JSON file when the request is built.
    pub fn template_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.template = Some(TemplateSource::File(path.into()));
        self
    }

    /// Deploy a template hosted at a URI.
    pub fn template_link(mut self, uri: impl Into<String>) -> Self {
        self.template = Some(TemplateSource::Link(ContentLink {
            uri: uri.into(),
            content_version: None,
        }));
        self
    }

    /// Set the whole parameters object.
    ///
    /// Accepts either a parameters file document (with `contentVersion` and a
    /// nested `parameters` object) or the bare parameters object. Bare values
    /// are wrapped as `{"value": ...}`.
    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(ParametersSource::Inline(parameters));
        self
    }

    /// Read parameters from a local parameters file when the request is built.
    pub fn parameters_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.parameters = Some(ParametersSource::File(path.into()));
        self
    }

    /// Use a parameters file hosted at a URI.
    pub fn parameters_link(mut self, uri: impl Into<String>) -> Self {
        self.parameters = Some(ParametersSource::Link(ContentLink {
            uri: uri.into(),
            content_version: None,
        }));
        self
    }

    /// Set a single parameter value. Overrides the same name from
    /// [`parameters`](Self::parameters).
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameter_values
            .insert(name.into(), serde_json::json!({"value": value.into()}));
        self
    }

    /// Set the deployment mode. Defaults to [`DeploymentMode::Incremental`].
    pub fn mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the debug detail level.
    pub fn debug_level(mut self, detail_level: impl Into<String>) -> Self {
        self.debug_setting = Some(DebugSetting {
            detail_level: detail_level.into(),
        });
        self
    }

    /// Set the on-error behavior.
    pub fn on_error_deployment(mut self, on_error: OnErrorDeployment) -> Self {
        self.on_error_deployment = Some(on_error);
        self
    }

    /// Build the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource group or template is missing, if
    /// individual parameters are combined with a parameters link, or if a
    /// template or parameters file cannot be read or parsed.
    pub fn build(self) -> ArmResult<DeploymentRequest> {
        let resource_group = self
            .resource_group
            .ok_or_else(|| ArmError::Builder("resource_group is required".into()))?;
        require_name("resource_group", &resource_group)?;

        let source = self
            .template
            .ok_or_else(|| ArmError::Builder("a template or template link is required".into()))?;

        let deployment_name = match self.deployment_name {
            Some(name) => {
                require_name("deployment_name", &name)?;
                name
            }
            None => default_deployment_name(&source),
        };

        let (template, template_link) = match source {
            TemplateSource::Inline(value) => (Some(value), None),
            TemplateSource::File(path) => (Some(read_json(&path)?), None),
            TemplateSource::Link(link) => (None, Some(link)),
        };

        let (mut parameters, parameters_link) = match self.parameters {
            Some(ParametersSource::Inline(value)) => (normalize_parameters(value)?, None),
            Some(ParametersSource::File(path)) => (normalize_parameters(read_json(&path)?)?, None),
            Some(ParametersSource::Link(link)) => (Map::new(), Some(link)),
            None => (Map::new(), None),
        };

        if parameters_link.is_some() && !self.parameter_values.is_empty() {
            return Err(ArmError::Builder(
                "individual parameters cannot be combined with a parameters link".into(),
            ));
        }
        parameters.extend(self.parameter_values);

        Ok(DeploymentRequest {
            resource_group,
            deployment_name,
            properties: DeploymentProperties {
                template,
                template_link,
                parameters: (!parameters.is_empty()).then_some(parameters),
                parameters_link,
                mode: self.mode,
                debug_setting: self.debug_setting,
                on_error_deployment: self.on_error_deployment,
            },
        })
    }
}

fn read_json(path: &Path) -> ArmResult<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn file_stem(source: &str) -> Option<String> {
    let without_query = source.split(['?', '#']).next().unwrap_or(source);
    let file = without_query.rsplit(['/', '\\']).next()?;
    let stem = Path::new(file).file_stem()?.to_str()?;
    (!stem.is_empty()).then(|| stem.to_string())
}

fn default_deployment_name(source: &TemplateSource) -> String {
    let stem = match source {
        TemplateSource::File(path) => path.to_str().and_then(file_stem),
        TemplateSource::Link(link) => file_stem(&link.uri),
        TemplateSource::Inline(_) => None,
    };
    stem.unwrap_or_else(|| {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        format!("deployment-{secs}")
    })
}

fn normalize_parameters(value: Value) -> ArmResult<Map<String, Value>> {
    let Value::Object(mut object) = value else {
        return Err(ArmError::Builder("parameters must be a JSON object".into()));
    };

    // Unwrap the parameters file document.
    if object.contains_key("contentVersion") {
        object = match object.remove("parameters") {
            Some(Value::Object(inner)) => inner,
            Some(_) => {
                return Err(ArmError::Builder(
                    "parameters file 'parameters' must be an object".into(),
                ))
            }
            None => Map::new(),
        };
    }

    Ok(object
        .into_iter()
        .map(|(name, value)| {
            let wrapped = match &value {
                Value::Object(o) if o.contains_key("value") || o.contains_key("reference") => value,
                _ => serde_json::json!({"value": value}),
            };
            (name, wrapped)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A deployment as returned by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentExtended {
    /// Fully qualified resource id.
    pub id: Option<String>,

    /// Deployment name.
    pub name: Option<String>,

    /// Deployment properties.
    pub properties: Option<DeploymentPropertiesExtended>,
}

/// Deployment properties reported by the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPropertiesExtended {
    pub provisioning_state: Option<ProvisioningState>,

    /// Correlation id shared by every operation of the deployment.
    pub correlation_id: Option<String>,

    /// ISO 8601 timestamp of the last state change.
    pub timestamp: Option<String>,

    /// ISO 8601 duration of the deployment.
    pub duration: Option<String>,

    pub mode: Option<DeploymentMode>,

    pub template_link: Option<ContentLink>,

    pub parameters: Option<Value>,

    pub parameters_link: Option<ContentLink>,

    /// Template outputs, available once the deployment succeeded.
    pub outputs: Option<Value>,

    pub debug_setting: Option<DebugSetting>,

    pub on_error_deployment: Option<OnErrorDeployment>,

    /// Error reported when the deployment failed.
    pub error: Option<ErrorDetail>,

    /// Non-blocking diagnostics reported by validation.
    #[serde(default)]
    pub diagnostics: Vec<DeploymentDiagnostic>,
}

/// A warning or informational message from template validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDiagnostic {
    /// `Info`, `Warning` or `Error`.
    pub level: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub target: Option<String>,
}

impl DeploymentExtended {
    /// The provisioning state, if the service reported one.
    pub fn provisioning_state(&self) -> Option<&ProvisioningState> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_ref())
    }

    /// The correlation id, if the service reported one.
    pub fn correlation_id(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.correlation_id.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    error: Option<ErrorDetail>,
    properties: Option<DeploymentPropertiesExtended>,
}

/// Outcome of a validate call.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Every reported error, nested details flattened depth first.
    pub errors: Vec<ValidationError>,

    /// Warnings and informational diagnostics.
    pub diagnostics: Vec<DeploymentDiagnostic>,
}

impl ValidationResult {
    /// Returns `true` when no errors were reported.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<ValidateResponse> for ValidationResult {
    fn from(response: ValidateResponse) -> Self {
        let errors = response
            .error
            .as_ref()
            .map(|e| {
                e.flatten()
                    .into_iter()
                    .map(|d| ValidationError {
                        code: d.code.clone(),
                        message: d.message.clone(),
                        target: d.target.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            errors,
            diagnostics: response
                .properties
                .map(|p| p.diagnostics)
                .unwrap_or_default(),
        }
    }
}

/// Identifies a submitted deployment for polling and cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentHandle {
    pub resource_group: String,
    pub deployment_name: String,
    pub correlation_id: Option<String>,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// Validate a deployment without executing it.
///
/// The service answers an invalid template with `400 Bad Request`; that body is
/// returned as a [`ValidationResult`] with errors rather than as an `Err`.
///
/// # Tracing
///
/// Emits a span named `arm::deployments::validate` with fields
/// `resource_group` and `deployment`.
#[tracing::instrument(
    name = "arm::deployments::validate",
    skip(client, request),
    fields(resource_group = %request.resource_group, deployment = %request.deployment_name)
)]
pub async fn validate(client: &ArmClient, request: &DeploymentRequest) -> ArmResult<ValidationResult> {
    tracing::debug!("validating deployment");

    let path = format!(
        "{}/validate",
        deployment_path(client, &request.resource_group, &request.deployment_name)
    );
    let body = DeploymentBody {
        properties: &request.properties,
    };
    let response = client.post_accepting(&path, &body, &[400]).await?;
    let status = response.status().as_u16();
    let text = response.text().await?;

    // A 400 is only data when it carries the validation error envelope.
    let parsed = if status == 400 {
        match serde_json::from_str::<ValidateResponse>(&text) {
            Ok(parsed) if parsed.error.is_some() => parsed,
            _ => return Err(ArmError::http(status, ArmClient::truncate_message(&text))),
        }
    } else {
        serde_json::from_str::<ValidateResponse>(&text)?
    };
    let result: ValidationResult = parsed.into();

    tracing::debug!(errors = result.errors.len(), "deployment validated");
    Ok(result)
}

/// Submit a deployment. Returns as soon as the service accepted it.
///
/// # Tracing
///
/// Emits a span named `arm::deployments::create_or_update` with fields
/// `resource_group` and `deployment`.
#[tracing::instrument(
    name = "arm::deployments::create_or_update",
    skip(client, request),
    fields(resource_group = %request.resource_group, deployment = %request.deployment_name)
)]
pub async fn begin_create_or_update(
    client: &ArmClient,
    request: &DeploymentRequest,
) -> ArmResult<DeploymentExtended> {
    tracing::debug!("submitting deployment");

    let path = deployment_path(client, &request.resource_group, &request.deployment_name);
    let body = DeploymentBody {
        properties: &request.properties,
    };
    let response = client.put(&path, &body).await?;
    let deployment = response.json::<DeploymentExtended>().await?;

    tracing::debug!(state = ?deployment.provisioning_state(), "deployment submitted");
    Ok(deployment)
}

/// Get a deployment.
///
/// # Tracing
///
/// Emits a span named `arm::deployments::get` with fields `resource_group` and `deployment`.
#[tracing::instrument(
    name = "arm::deployments::get",
    skip(client),
    fields(resource_group = %resource_group, deployment = %name)
)]
pub async fn get(client: &ArmClient, resource_group: &str, name: &str) -> ArmResult<DeploymentExtended> {
    require_name("deployment name", name)?;
    tracing::trace!("getting deployment");

    let response = client.get(&deployment_path(client, resource_group, name)).await?;
    let deployment = response.json::<DeploymentExtended>().await?;

    tracing::trace!(state = ?deployment.provisioning_state(), "deployment retrieved");
    Ok(deployment)
}

/// Check whether a deployment exists.
#[tracing::instrument(
    name = "arm::deployments::check_existence",
    skip(client),
    fields(resource_group = %resource_group, deployment = %name)
)]
pub async fn check_existence(client: &ArmClient, resource_group: &str, name: &str) -> ArmResult<bool> {
    require_name("deployment name", name)?;
    client.head(&deployment_path(client, resource_group, name)).await
}

/// List the deployments of a resource group, following every page.
///
/// `provisioning_state` narrows the listing server side.
///
/// # Tracing
///
/// Emits a span named `arm::deployments::list` with field `resource_group`.
#[tracing::instrument(
    name = "arm::deployments::list",
    skip(client, provisioning_state),
    fields(resource_group = %resource_group)
)]
pub async fn list(
    client: &ArmClient,
    resource_group: &str,
    provisioning_state: Option<&ProvisioningState>,
) -> ArmResult<Vec<DeploymentExtended>> {
    require_name("resource group name", resource_group)?;
    tracing::debug!("listing deployments");

    let filter = provisioning_state.map(|s| format!("provisioningState eq '{s}'"));
    let query: Vec<(&str, &str)> = filter
        .as_deref()
        .map(|f| vec![("$filter", f)])
        .unwrap_or_default();

    let deployments: Vec<DeploymentExtended> = client
        .list_all(&deployments_path(client, resource_group), &query)
        .await?;

    tracing::debug!(count = deployments.len(), "deployments listed");
    Ok(deployments)
}

/// Ask the service to cancel a running deployment.
///
/// Only `Accepted` and `Running` deployments can be cancelled. The service
/// answers other states with a `409 Conflict`, surfaced as [`ArmError::Api`].
///
/// # Tracing
///
/// Emits a span named `arm::deployments::cancel` with fields `resource_group` and `deployment`.
#[tracing::instrument(
    name = "arm::deployments::cancel",
    skip(client),
    fields(resource_group = %resource_group, deployment = %name)
)]
pub async fn cancel(client: &ArmClient, resource_group: &str, name: &str) -> ArmResult<()> {
    require_name("deployment name", name)?;
    tracing::debug!("cancelling deployment");

    let path = format!("{}/cancel", deployment_path(client, resource_group, name));
    client.post(&path, &serde_json::json!({})).await?;

    tracing::debug!("deployment cancellation accepted");
    Ok(())
}
