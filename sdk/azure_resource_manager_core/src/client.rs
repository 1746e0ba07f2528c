//! HTTP client for Azure Resource Manager.
//!
//! This module provides [`ArmClient`], the main entry point for interacting
//! with the management plane. The client handles authentication, HTTP
//! transport, the `api-version` query parameter, subscription scoping and
//! decoding of ARM error envelopes.
//!
//! # Examples
//!
//! ## Using a pre-acquired token
//! ```rust,no_run
//! use azure_resource_manager_core::client::ArmClient;
//! use azure_resource_manager_core::auth::ArmCredential;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArmClient::builder()
//!     .subscription_id("00000000-0000-0000-0000-000000000000")
//!     .credential(ArmCredential::bearer_token("eyJ0eXAi..."))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the Azure CLI
//! ```rust,no_run
//! use azure_resource_manager_core::client::ArmClient;
//! use azure_resource_manager_core::auth::ArmCredential;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArmClient::builder()
//!     .subscription_id("00000000-0000-0000-0000-000000000000")
//!     .credential(ArmCredential::azure_cli()?)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::ArmCredential;
use crate::error::{ArmError, ArmResult};
use crate::models::Page;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use std::time::Duration;

/// Public-cloud management endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Default API version for the `Microsoft.Resources` provider.
pub const DEFAULT_API_VERSION: &str = "2021-04-01";

/// Environment variable overriding the management endpoint.
pub const ENDPOINT_ENV: &str = "AZURE_RESOURCE_MANAGER_ENDPOINT";

/// Environment variable holding the subscription id.
pub const SUBSCRIPTION_ENV: &str = "AZURE_SUBSCRIPTION_ID";

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Determines if an HTTP status code represents a retriable error.
///
/// Retriable errors are transient server-side issues that may succeed on retry:
/// - 429 Too Many Requests (throttling)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Configuration for automatic retry behavior on transient errors.
///
/// The default policy performs no retries: every operation either returns a
/// parsed body or surfaces the service error to the caller. Retries are
/// opt-in through [`ArmClientBuilder::retry_policy`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial backoff duration before the first retry.
    /// Subsequent retries use exponential backoff (2^attempt * initial_backoff).
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Exponential backoff with jitter.
    pub fn exponential(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }
}

/// The base client for interacting with Azure Resource Manager.
///
/// The client is cheaply cloneable and can be shared across threads, so
/// independent deployments can be driven concurrently from one client.
#[derive(Debug, Clone)]
pub struct ArmClient {
    pub(crate) http: HttpClient,
    pub(crate) endpoint: Url,
    pub(crate) subscription_id: String,
    pub(crate) credential: ArmCredential,
    pub(crate) api_version: String,
    pub(crate) retry_policy: RetryPolicy,
}

/// Builder for constructing an [`ArmClient`].
///
/// Use [`ArmClient::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct ArmClientBuilder {
    endpoint: Option<String>,
    subscription_id: Option<String>,
    credential: Option<ArmCredential>,
    api_version: Option<String>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
}

impl ArmClient {
    /// Create a new builder for configuring an `ArmClient`.
    pub fn builder() -> ArmClientBuilder {
        ArmClientBuilder::default()
    }

    /// Get the management endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get the subscription every request is scoped to.
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Get the API version being used.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Get the retry policy configuration.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// The `/subscriptions/{id}` prefix for subscription-scoped paths.
    pub fn subscription_path(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }

    /// Build a full URL for an API path.
    ///
    /// The client's `api-version` is appended as a query parameter unless the
    /// path already carries one (as `nextLink` URLs do).
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined to the endpoint URL.
    pub fn url(&self, path: &str) -> ArmResult<Url> {
        self.url_with_query(path, &[])
    }

    /// Build a full URL for an API path with extra query parameters.
    pub fn url_with_query(&self, path: &str, query: &[(&str, &str)]) -> ArmResult<Url> {
        let mut url = self
            .endpoint
            .join(path)
            .map_err(|e| ArmError::invalid_endpoint_with_source("failed to construct URL", e))?;

        let has_version = url.query_pairs().any(|(k, _)| k == "api-version");
        if !query.is_empty() || !has_version {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if !has_version {
                pairs.append_pair("api-version", &self.api_version);
            }
        }

        Ok(url)
    }

    /// Turn an absolute `nextLink` (or any absolute URL returned by the service)
    /// into a path + query relative to the endpoint.
    pub fn relative_path(link: &str) -> ArmResult<String> {
        let parsed = Url::parse(link)
            .map_err(|e| ArmError::invalid_endpoint_with_source("failed to parse nextLink URL", e))?;

        Ok(match parsed.query() {
            Some(q) => format!("{}?{q}", parsed.path()),
            None => parsed.path().to_string(),
        })
    }

    /// Send a GET request and fail on any non-success status.
    pub async fn get(&self, path: &str) -> ArmResult<reqwest::Response> {
        let url = self.url(path)?;
        let response = self.send(Method::GET, url, None::<&()>).await?;
        Self::check_response(response).await
    }

    /// Send a GET request with extra query parameters.
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ArmResult<reqwest::Response> {
        let url = self.url_with_query(path, query)?;
        let response = self.send(Method::GET, url, None::<&()>).await?;
        Self::check_response(response).await
    }

    /// Send a PUT request with a JSON body.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ArmResult<reqwest::Response> {
        let url = self.url(path)?;
        let response = self.send(Method::PUT, url, Some(body)).await?;
        Self::check_response(response).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ArmResult<reqwest::Response> {
        let url = self.url(path)?;
        let response = self.send(Method::POST, url, Some(body)).await?;
        Self::check_response(response).await
    }

    /// Send a POST request, handing back responses whose status is listed in
    /// `accepted` without converting them into errors.
    ///
    /// Template validation answers `400 Bad Request` with a result body that
    /// callers need to read as data.
    pub async fn post_accepting<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        accepted: &[u16],
    ) -> ArmResult<reqwest::Response> {
        let url = self.url(path)?;
        let response = self.send(Method::POST, url, Some(body)).await?;
        if accepted.contains(&response.status().as_u16()) {
            return Ok(response);
        }
        Self::check_response(response).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> ArmResult<reqwest::Response> {
        let url = self.url(path)?;
        let response = self.send(Method::DELETE, url, None::<&()>).await?;
        Self::check_response(response).await
    }

    /// Send a HEAD request and report whether the resource exists.
    ///
    /// `2xx` means it exists and `404` means it does not. Anything else is an error.
    pub async fn head(&self, path: &str) -> ArmResult<bool> {
        let url = self.url(path)?;
        let response = self.send(Method::HEAD, url, None::<&()>).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check_response(response).await.map(|_| true),
        }
    }

    /// GET a paged collection and follow `nextLink` until every page is read.
    ///
    /// # Tracing
    ///
    /// Emits a span named `arm::client::list_all` with field `path`.
    #[tracing::instrument(name = "arm::client::list_all", skip_all, fields(path = %path))]
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ArmResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Page<T> = self.get_with_query(path, query).await?.json().await?;

        loop {
            items.append(&mut page.value);
            let Some(next) = page.next_link.take().filter(|l| !l.is_empty()) else {
                break;
            };
            tracing::trace!(next_link = %next, "following nextLink");
            let next_path = Self::relative_path(&next)?;
            page = self.get(&next_path).await?.json().await?;
        }

        Ok(items)
    }

    /// Send a request with automatic retry on transient errors.
    ///
    /// Returns the final response without inspecting its status; callers
    /// decide which statuses count as errors.
    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&T>,
    ) -> ArmResult<reqwest::Response> {
        let auth = self.credential.resolve().await?;

        for attempt in 0..=self.retry_policy.max_retries {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header("Authorization", &auth);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;

            let status = response.status().as_u16();

            // Success, non-retriable error, or last attempt
            if response.status().is_success()
                || !is_retriable_status(status)
                || attempt == self.retry_policy.max_retries
            {
                return Ok(response);
            }

            // Calculate backoff with jitter: base_backoff * jitter_factor
            // jitter_factor is in range [0.75, 1.25]
            let base_backoff = self.retry_policy.initial_backoff * 2_u32.pow(attempt);
            let jitter = 0.75 + fastrand::f64() * 0.5;
            let backoff = base_backoff.mul_f64(jitter);
            tracing::debug!(status, attempt, ?backoff, "transient error, retrying");
            tokio::time::sleep(backoff).await;
        }

        unreachable!("retry loop should return before reaching here")
    }

    /// Maximum length for error messages to prevent sensitive data leaks.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Sanitize error messages by redacting bearer tokens.
    pub(crate) fn sanitize_error_message(msg: &str) -> String {
        let mut result = msg.to_string();

        // Use offset to avoid infinite loops
        let mut search_start = 0;
        while search_start < result.len() {
            let Some(relative_pos) = result[search_start..].find("Bearer ") else {
                break;
            };
            let token_start = search_start + relative_pos + 7; // "Bearer " is 7 chars
            if token_start >= result.len() {
                break;
            }

            // Skip if already redacted
            if result[token_start..].starts_with("[REDACTED]") {
                search_start = token_start + 10;
                continue;
            }

            let token_end = result[token_start..]
                .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
                .map(|pos| token_start + pos)
                .unwrap_or(result.len());

            if token_end > token_start {
                result.replace_range(token_start..token_end, "[REDACTED]");
                search_start = token_start + 10; // "[REDACTED]" is 10 chars
            } else {
                search_start = token_start;
            }
        }

        result
    }

    /// Truncate a message if it exceeds the maximum length.
    /// Also sanitizes sensitive data before truncating.
    pub fn truncate_message(msg: &str) -> String {
        let sanitized = Self::sanitize_error_message(msg);

        if sanitized.len() > Self::MAX_ERROR_MESSAGE_LEN {
            let mut cut = Self::MAX_ERROR_MESSAGE_LEN;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated)", &sanitized[..cut])
        } else {
            sanitized
        }
    }

    /// Check the response status and return an error if not successful.
    pub async fn check_response(response: reqwest::Response) -> ArmResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let envelope = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get("error").cloned());

        let message = envelope
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or(&body);

        if status == 404 {
            let message = if message.is_empty() {
                "resource not found"
            } else {
                message
            };
            return Err(ArmError::not_found(Self::truncate_message(message)));
        }

        if let Some(err_obj) = &envelope {
            return Err(ArmError::Api {
                code: err_obj
                    .get("code")
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                message: Self::truncate_message(message),
            });
        }

        Err(ArmError::http(status, Self::truncate_message(&body)))
    }
}

impl ArmClientBuilder {
    /// Set the management endpoint URL.
    ///
    /// If not set, the builder checks the `AZURE_RESOURCE_MANAGER_ENDPOINT`
    /// environment variable and falls back to [`DEFAULT_ENDPOINT`].
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the subscription id.
    ///
    /// If not set, the builder reads `AZURE_SUBSCRIPTION_ID`.
    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    /// Set the credential to use for authentication.
    ///
    /// If not set, the builder uses [`ArmCredential::from_env()`].
    pub fn credential(mut self, credential: ArmCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the API version.
    ///
    /// Defaults to [`DEFAULT_API_VERSION`].
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// on this builder is ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout covering the entire request/response cycle.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for transient errors (429, 500, 502, 503, 504).
    ///
    /// Defaults to [`RetryPolicy::none()`].
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the `ArmClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No subscription id is provided and `AZURE_SUBSCRIPTION_ID` is not set
    /// - The endpoint URL is invalid
    /// - Credential creation fails (when using environment-based credentials)
    pub fn build(self) -> ArmResult<ArmClient> {
        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                .build()?,
        };

        let endpoint_str = self
            .endpoint
            .or_else(|| std::env::var(ENDPOINT_ENV).ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let endpoint = Url::parse(&endpoint_str)
            .map_err(|e| ArmError::invalid_endpoint_with_source("invalid endpoint URL", e))?;

        let subscription_id = self
            .subscription_id
            .or_else(|| std::env::var(SUBSCRIPTION_ENV).ok())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ArmError::MissingConfig(
                    "subscription id is required. Set it via builder or AZURE_SUBSCRIPTION_ID env var."
                        .into(),
                )
            })?;

        let credential = match self.credential {
            Some(credential) => credential,
            None => ArmCredential::from_env()?,
        };

        Ok(ArmClient {
            http,
            endpoint,
            subscription_id,
            credential,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            retry_policy: self.retry_policy.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{setup_mock_client, TEST_SUBSCRIPTION_ID, TEST_TOKEN};
    use serial_test::serial;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_builder() -> ArmClientBuilder {
        ArmClient::builder()
            .subscription_id("sub-1")
            .credential(ArmCredential::bearer_token("test"))
    }

    #[test]
    #[serial]
    fn builder_requires_subscription() {
        std::env::remove_var(SUBSCRIPTION_ENV);

        let result = ArmClient::builder()
            .credential(ArmCredential::bearer_token("test"))
            .build();

        assert!(matches!(result.unwrap_err(), ArmError::MissingConfig(_)));
    }

    #[test]
    #[serial]
    fn builder_reads_subscription_from_env() {
        let original = std::env::var(SUBSCRIPTION_ENV).ok();
        std::env::set_var(SUBSCRIPTION_ENV, "env-sub");

        let client = ArmClient::builder()
            .credential(ArmCredential::bearer_token("test"))
            .build()
            .expect("should build");
        assert_eq!(client.subscription_id(), "env-sub");

        match original {
            Some(val) => std::env::set_var(SUBSCRIPTION_ENV, val),
            None => std::env::remove_var(SUBSCRIPTION_ENV),
        }
    }

    #[test]
    #[serial]
    fn builder_defaults_to_public_cloud() {
        std::env::remove_var(ENDPOINT_ENV);

        let client = test_builder().build().expect("should build");

        assert_eq!(client.endpoint().as_str(), "https://management.azure.com/");
        assert_eq!(client.api_version(), DEFAULT_API_VERSION);
        assert_eq!(client.retry_policy().max_retries, 0);
    }

    #[test]
    #[serial]
    fn builder_endpoint_overrides_env() {
        let original = std::env::var(ENDPOINT_ENV).ok();
        std::env::set_var(ENDPOINT_ENV, "https://management.chinacloudapi.cn");

        let client = test_builder()
            .endpoint("https://management.usgovcloudapi.net")
            .build()
            .expect("should build");
        assert_eq!(
            client.endpoint().as_str(),
            "https://management.usgovcloudapi.net/"
        );

        match original {
            Some(val) => std::env::set_var(ENDPOINT_ENV, val),
            None => std::env::remove_var(ENDPOINT_ENV),
        }
    }

    #[test]
    fn builder_invalid_endpoint_url() {
        let result = test_builder().endpoint("not a valid url").build();

        assert!(matches!(
            result.unwrap_err(),
            ArmError::InvalidEndpoint { .. }
        ));
    }

    #[test]
    fn url_appends_api_version() {
        let client = test_builder().build().expect("should build");

        let url = client.url("/subscriptions/sub-1/resourcegroups/rg1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.azure.com/subscriptions/sub-1/resourcegroups/rg1?api-version=2021-04-01"
        );
    }

    #[test]
    fn url_keeps_existing_api_version() {
        let client = test_builder().build().expect("should build");

        let url = client
            .url("/subscriptions/sub-1/resourcegroups?api-version=2020-06-01&%24skiptoken=abc")
            .unwrap();
        assert_eq!(url.query_pairs().filter(|(k, _)| k == "api-version").count(), 1);
        assert!(url.as_str().contains("api-version=2020-06-01"));
    }

    #[test]
    fn url_with_query_encodes_filter() {
        let client = test_builder().build().expect("should build");

        let url = client
            .url_with_query(
                "/subscriptions/sub-1/resourcegroups",
                &[("$filter", "tagName eq 'env'")],
            )
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("$filter".into(), "tagName eq 'env'".into()));
        assert_eq!(pairs[1], ("api-version".into(), "2021-04-01".into()));
    }

    #[test]
    fn relative_path_strips_host() {
        let path = ArmClient::relative_path(
            "https://management.azure.com/subscriptions/s/resourcegroups?api-version=2021-04-01&%24skiptoken=x",
        )
        .unwrap();
        assert_eq!(
            path,
            "/subscriptions/s/resourcegroups?api-version=2021-04-01&%24skiptoken=x"
        );
    }

    #[test]
    fn subscription_path_uses_id() {
        let client = test_builder().build().expect("should build");
        assert_eq!(client.subscription_path(), "/subscriptions/sub-1");
    }

    #[test]
    fn identifies_retriable_http_errors() {
        assert!(is_retriable_status(429));
        assert!(is_retriable_status(500));
        assert!(is_retriable_status(502));
        assert!(is_retriable_status(503));
        assert!(is_retriable_status(504));
        assert!(!is_retriable_status(400));
        assert!(!is_retriable_status(404));
        assert!(!is_retriable_status(409));
        assert!(!is_retriable_status(200));
    }

    #[tokio::test]
    async fn get_request_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test/endpoint"))
            .and(header("Authorization", "Bearer test-access-token"))
            .and(query_param("api-version", DEFAULT_API_VERSION))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
            )
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let response = client.get("/test/endpoint").await.expect("should succeed");

        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn error_envelope_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/test/endpoint"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": {
                    "code": "Conflict",
                    "message": "Another operation is in progress"
                }
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client
            .put("/test/endpoint", &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ArmError::Api { code, message } => {
                assert_eq!(code, "Conflict");
                assert_eq!(message, "Another operation is in progress");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn not_found_maps_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {
                    "code": "ResourceGroupNotFound",
                    "message": "Resource group 'rg1' could not be found."
                }
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client.get("/missing").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("rg1"));
    }

    #[tokio::test]
    async fn error_response_with_non_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test/endpoint"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client.get("/test/endpoint").await.unwrap_err();

        match err {
            ArmError::Http { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("Expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn head_reports_existence() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/exists"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/absent"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;

        assert!(client.head("/exists").await.unwrap());
        assert!(!client.head("/absent").await.unwrap());
        assert!(matches!(
            client.head("/forbidden").await.unwrap_err(),
            ArmError::Http { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn post_accepting_passes_listed_statuses_through() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/validate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": "InvalidTemplate", "message": "bad"}
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;

        let response = client
            .post_accepting("/validate", &serde_json::json!({}), &[400])
            .await
            .expect("400 should be accepted");
        assert_eq!(response.status(), 400);

        let err = client
            .post("/validate", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArmError::Api { .. }));
    }

    #[tokio::test]
    async fn list_all_follows_next_link() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [3]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [1, 2],
                "nextLink": format!("{}/items?api-version=2021-04-01&page=2", server.uri())
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let items: Vec<u32> = client.list_all("/items", &[]).await.unwrap();

        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn list_all_emits_span() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pages"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [1],
                "nextLink": format!("{}/pages?api-version=2021-04-01&page=2", server.uri())
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let _ = client.list_all::<u32>("/pages", &[]).await;

        assert!(logs_contain("arm::client::list_all"));
        assert!(logs_contain("following nextLink"));
    }

    #[tokio::test]
    async fn default_policy_does_not_retry() {
        let server = MockServer::start().await;
        let request_count = Arc::new(AtomicU32::new(0));
        let counter = request_count.clone();

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(move |_req: &wiremock::Request| {
                counter.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(503).set_body_string("Service Unavailable")
            })
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let result = client.get("/flaky").await;

        assert!(result.is_err());
        assert_eq!(request_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn opt_in_policy_retries_on_503() {
        let server = MockServer::start().await;
        let request_count = Arc::new(AtomicU32::new(0));
        let counter = request_count.clone();

        // Fails with 503 twice, then succeeds
        Mock::given(method("GET"))
            .and(path("/retry-test"))
            .respond_with(move |_req: &wiremock::Request| {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    ResponseTemplate::new(503).set_body_string("Service Unavailable")
                } else {
                    ResponseTemplate::new(200).set_body_string("OK")
                }
            })
            .mount(&server)
            .await;

        let client = ArmClient::builder()
            .endpoint(server.uri())
            .subscription_id(TEST_SUBSCRIPTION_ID)
            .credential(ArmCredential::bearer_token(TEST_TOKEN))
            .retry_policy(RetryPolicy::exponential(3, Duration::from_millis(10)))
            .build()
            .expect("should build");

        let result = client.get("/retry-test").await;

        assert!(result.is_ok(), "Expected success after retries, got {result:?}");
        assert_eq!(request_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn error_sanitization_removes_bearer_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sensitive-error"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {
                    "code": "InvalidAuthenticationToken",
                    "message": "Token rejected: Bearer eyJ0eXAiOiJKV1QiLCJhbGciOi"
                }
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err_string = client.get("/sensitive-error").await.unwrap_err().to_string();

        assert!(!err_string.contains("eyJ0eXAiOiJKV1QiLCJhbGciOi"));
        assert!(err_string.contains("[REDACTED]"));
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(1500);
        let truncated = ArmClient::truncate_message(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert_eq!(truncated.len(), 1000 + "... (truncated)".len());
    }
}
