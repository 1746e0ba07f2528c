//! Resource group operations.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_resource_manager_core::client::ArmClient;
//! use azure_resource_manager_resources::resource_group::{self, ResourceGroupCreateRequest};
//!
//! # async fn example(client: &ArmClient) -> azure_resource_manager_core::error::ArmResult<()> {
//! if !resource_group::check_existence(client, "my-rg").await? {
//!     let request = ResourceGroupCreateRequest::builder()
//!         .location("westeurope")
//!         .tag("env", "dev")
//!         .build()?;
//!     resource_group::create_or_update(client, "my-rg", &request).await?;
//! }
//! # Ok(())
//! # }
//! ```

use azure_resource_manager_core::client::ArmClient;
use azure_resource_manager_core::error::{ArmError, ArmResult};
use azure_resource_manager_core::models::ProvisioningState;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::models::{require_name, resource_group_path, resource_groups_path};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of a resource group PUT.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupCreateRequest {
    /// Azure region of the group.
    pub location: String,

    /// Tags applied to the group.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Id of the resource that manages this group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
}

/// Builder for [`ResourceGroupCreateRequest`].
#[derive(Debug, Default)]
pub struct ResourceGroupCreateRequestBuilder {
    location: Option<String>,
    tags: BTreeMap<String, String>,
    managed_by: Option<String>,
}

impl ResourceGroupCreateRequest {
    /// Create a new builder.
    pub fn builder() -> ResourceGroupCreateRequestBuilder {
        ResourceGroupCreateRequestBuilder::default()
    }
}

impl ResourceGroupCreateRequestBuilder {
    /// Set the location.
    ///
    /// **Required.**
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Add a tag.
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Set the managing resource id.
    pub fn managed_by(mut self, managed_by: impl Into<String>) -> Self {
        self.managed_by = Some(managed_by.into());
        self
    }

    /// Build the request.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` is missing or empty.
    pub fn build(self) -> ArmResult<ResourceGroupCreateRequest> {
        let location = self
            .location
            .ok_or_else(|| ArmError::Builder("location is required".into()))?;

        if location.trim().is_empty() {
            return Err(ArmError::Builder("location cannot be empty".into()));
        }

        Ok(ResourceGroupCreateRequest {
            location,
            tags: self.tags,
            managed_by: self.managed_by,
        })
    }
}

/// Tag filter for [`list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupFilter {
    /// Tag name the group must carry.
    pub tag_name: String,
    /// Tag value the group must carry, if any.
    pub tag_value: Option<String>,
}

impl ResourceGroupFilter {
    /// Match groups carrying a tag, whatever its value.
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            tag_name: name.into(),
            tag_value: None,
        }
    }

    /// Match groups carrying a tag with a specific value.
    pub fn tag_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag_name: name.into(),
            tag_value: Some(value.into()),
        }
    }

    /// Whether `tags` satisfy this filter. Tag names compare case-insensitively.
    pub fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        tags.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case(&self.tag_name)
                && self.tag_value.as_ref().is_none_or(|v| v == value)
        })
    }

    /// The OData `$filter` expression.
    pub fn to_odata(&self) -> String {
        let quote = |s: &str| s.replace('\'', "''");
        match &self.tag_value {
            Some(value) => format!(
                "tagName eq '{}' and tagValue eq '{}'",
                quote(&self.tag_name),
                quote(value)
            ),
            None => format!("tagName eq '{}'", quote(&self.tag_name)),
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A resource group as returned by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    /// Fully qualified resource id.
    pub id: Option<String>,

    /// Group name.
    pub name: Option<String>,

    /// Azure region.
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,

    /// Group properties.
    pub properties: Option<ResourceGroupProperties>,

    /// Tags on the group. An explicit `null` reads as no tags.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, String>,

    /// Id of the resource that manages this group.
    pub managed_by: Option<String>,
}

/// Properties of a resource group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    /// Current provisioning state.
    pub provisioning_state: Option<ProvisioningState>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ResourceGroup {
    /// The provisioning state, if the service reported one.
    pub fn provisioning_state(&self) -> Option<&ProvisioningState> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_ref())
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// Check whether a resource group exists.
///
/// # Tracing
///
/// Emits a span named `arm::resource_groups::check_existence` with field `resource_group`.
#[tracing::instrument(
    name = "arm::resource_groups::check_existence",
    skip(client),
    fields(resource_group = %name)
)]
pub async fn check_existence(client: &ArmClient, name: &str) -> ArmResult<bool> {
    require_name("resource group name", name)?;
    let exists = client.head(&resource_group_path(client, name)).await?;
    tracing::debug!(exists, "resource group existence checked");
    Ok(exists)
}

/// Create or update a resource group.
///
/// # Tracing
///
/// Emits a span named `arm::resource_groups::create_or_update` with fields
/// `resource_group` and `location`.
#[tracing::instrument(
    name = "arm::resource_groups::create_or_update",
    skip(client, request),
    fields(resource_group = %name, location = %request.location)
)]
pub async fn create_or_update(
    client: &ArmClient,
    name: &str,
    request: &ResourceGroupCreateRequest,
) -> ArmResult<ResourceGroup> {
    require_name("resource group name", name)?;
    tracing::debug!("creating resource group");

    let response = client.put(&resource_group_path(client, name), request).await?;
    let group = response.json::<ResourceGroup>().await?;

    tracing::debug!(state = ?group.provisioning_state(), "resource group created");
    Ok(group)
}

/// Get a resource group, optionally expanding extra properties
/// (`createdTime,changedTime`).
///
/// # Tracing
///
/// Emits a span named `arm::resource_groups::get` with field `resource_group`.
#[tracing::instrument(
    name = "arm::resource_groups::get",
    skip(client),
    fields(resource_group = %name)
)]
pub async fn get(client: &ArmClient, name: &str, expand: Option<&str>) -> ArmResult<ResourceGroup> {
    require_name("resource group name", name)?;
    tracing::debug!("getting resource group");

    let path = resource_group_path(client, name);
    let response = match expand {
        Some(expand) => client.get_with_query(&path, &[("$expand", expand)]).await?,
        None => client.get(&path).await?,
    };
    let group = response.json::<ResourceGroup>().await?;

    tracing::debug!(location = %group.location, "resource group retrieved");
    Ok(group)
}

/// List the resource groups of the subscription, following every page.
///
/// # Tracing
///
/// Emits a span named `arm::resource_groups::list`.
#[tracing::instrument(name = "arm::resource_groups::list", skip(client, filter))]
pub async fn list(
    client: &ArmClient,
    filter: Option<&ResourceGroupFilter>,
) -> ArmResult<Vec<ResourceGroup>> {
    tracing::debug!("listing resource groups");

    let odata = filter.map(ResourceGroupFilter::to_odata);
    let query: Vec<(&str, &str)> = odata
        .as_deref()
        .map(|f| vec![("$filter", f)])
        .unwrap_or_default();

    let groups: Vec<ResourceGroup> = client
        .list_all(&resource_groups_path(client), &query)
        .await?;

    tracing::debug!(count = groups.len(), "resource groups listed");
    Ok(groups)
}

/// Begin deleting a resource group.
///
/// Returns once the service has accepted the request; the group and its
/// resources are removed asynchronously.
///
/// # Tracing
///
/// Emits a span named `arm::resource_groups::delete` with field `resource_group`.
#[tracing::instrument(
    name = "arm::resource_groups::delete",
    skip(client),
    fields(resource_group = %name)
)]
pub async fn delete(client: &ArmClient, name: &str) -> ArmResult<()> {
    require_name("resource group name", name)?;
    tracing::debug!("deleting resource group");

    let response = client.delete(&resource_group_path(client, name)).await?;

    tracing::debug!(status = response.status().as_u16(), "resource group deletion accepted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_resource_manager_core::test_utils::{setup_mock_client, TEST_SUBSCRIPTION_ID};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn group_path(name: &str) -> String {
        format!("/subscriptions/{TEST_SUBSCRIPTION_ID}/resourcegroups/{name}")
    }

    #[test]
    fn create_request_requires_location() {
        let err = ResourceGroupCreateRequest::builder().build().unwrap_err();
        assert!(err.to_string().contains("location is required"));

        let err = ResourceGroupCreateRequest::builder()
            .location(" ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("location cannot be empty"));
    }

    #[test]
    fn create_request_serialization_skips_empty_fields() {
        let request = ResourceGroupCreateRequest::builder()
            .location("westus")
            .build()
            .unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"location": "westus"}));
    }

    #[test]
    fn filter_to_odata_escapes_quotes() {
        assert_eq!(
            ResourceGroupFilter::tag("env").to_odata(),
            "tagName eq 'env'"
        );
        assert_eq!(
            ResourceGroupFilter::tag_value("owner", "o'brien").to_odata(),
            "tagName eq 'owner' and tagValue eq 'o''brien'"
        );
    }

    #[test]
    fn filter_matches_tags() {
        let tags = BTreeMap::from([("Env".to_string(), "prod".to_string())]);
        assert!(ResourceGroupFilter::tag("env").matches(&tags));
        assert!(ResourceGroupFilter::tag_value("env", "prod").matches(&tags));
        assert!(!ResourceGroupFilter::tag_value("env", "dev").matches(&tags));
        assert!(!ResourceGroupFilter::tag("owner").matches(&tags));
    }

    #[test]
    fn resource_group_deserialization() {
        let group: ResourceGroup = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/abc/resourceGroups/rg1",
            "name": "rg1",
            "type": "Microsoft.Resources/resourceGroups",
            "location": "westus",
            "properties": {"provisioningState": "Succeeded"},
            "tags": {"env": "dev"}
        }))
        .unwrap();

        assert_eq!(group.name.as_deref(), Some("rg1"));
        assert_eq!(group.provisioning_state(), Some(&ProvisioningState::Succeeded));
        assert_eq!(group.tags["env"], "dev");
    }

    #[test]
    fn resource_group_null_tags_read_as_empty() {
        let group: ResourceGroup = serde_json::from_value(serde_json::json!({
            "name": "rg1",
            "location": "westus",
            "tags": null
        }))
        .unwrap();

        assert!(group.tags.is_empty());
        assert!(!ResourceGroupFilter::tag("env").matches(&group.tags));
    }

    #[tokio::test]
    async fn check_existence_true_and_false() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path(group_path("present")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(group_path("absent")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;

        assert!(check_existence(&client, "present").await.unwrap());
        assert!(!check_existence(&client, "absent").await.unwrap());
    }

    #[tokio::test]
    async fn create_or_update_sends_location_and_tags() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(group_path("rg1")))
            .and(body_json(serde_json::json!({
                "location": "westus",
                "tags": {"env": "dev"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "/subscriptions/abc/resourceGroups/rg1",
                "name": "rg1",
                "location": "westus",
                "properties": {"provisioningState": "Succeeded"},
                "tags": {"env": "dev"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let request = ResourceGroupCreateRequest::builder()
            .location("westus")
            .tag("env", "dev")
            .build()
            .unwrap();

        let group = create_or_update(&client, "rg1", &request).await.unwrap();
        assert_eq!(group.name.as_deref(), Some("rg1"));
        assert_eq!(group.location, "westus");
    }

    #[tokio::test]
    async fn get_passes_expand() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(group_path("rg1")))
            .and(query_param("$expand", "createdTime,changedTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "rg1",
                "location": "eastus"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let group = get(&client, "rg1", Some("createdTime,changedTime"))
            .await
            .unwrap();
        assert_eq!(group.location, "eastus");
    }

    #[tokio::test]
    async fn list_applies_tag_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{TEST_SUBSCRIPTION_ID}/resourcegroups"
            )))
            .and(query_param("$filter", "tagName eq 'env' and tagValue eq 'prod'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {"name": "rg1", "location": "westus"},
                    {"name": "rg2", "location": "westus"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let filter = ResourceGroupFilter::tag_value("env", "prod");
        let groups = list(&client, Some(&filter)).await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].name.as_deref(), Some("rg2"));
    }

    #[tokio::test]
    async fn delete_accepts_202() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(group_path("rg1")))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        delete(&client, "rg1").await.unwrap();
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn check_existence_emits_span() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path(group_path("traced")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let _ = check_existence(&client, "traced").await;

        assert!(logs_contain("arm::resource_groups::check_existence"));
        assert!(logs_contain("resource_group=traced"));
    }

    #[tokio::test]
    async fn empty_name_is_rejected_without_request() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server).await;

        let err = check_existence(&client, "").await.unwrap_err();
        assert!(matches!(err, ArmError::Builder(_)));
    }
}
