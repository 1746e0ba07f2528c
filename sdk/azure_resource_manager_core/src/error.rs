use thiserror::Error;

/// A single validation failure reported by the service for a deployment template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code (e.g. `InvalidTemplate`).
    pub code: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// The template element the error refers to, if reported.
    pub target: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Code={}; Message={}", self.code, self.message)
    }
}

/// Errors that can occur when interacting with the Azure Resource Manager API.
#[derive(Error, Debug)]
pub enum ArmError {
    /// The request failed due to an HTTP error.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The request payload could not be serialized or the response could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request failed at the transport level.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// A local file (template or parameters) could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint URL is invalid.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// A request builder was given invalid or incomplete input.
    #[error("Invalid request: {0}")]
    Builder(String),

    /// The API returned an error response.
    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },

    /// The requested resource does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// A resource group could not be created.
    #[error("Resource group '{name}' could not be created: {source}")]
    ResourceGroup {
        name: String,
        #[source]
        source: Box<ArmError>,
    },

    /// Template validation reported errors, so the deployment was not submitted.
    #[error("Template validation failed with {} error(s)", .0.len())]
    TemplateValidation(Vec<ValidationError>),

    /// A polymorphic payload carried a discriminator value this SDK does not know.
    #[error("Unknown variant '{tag}' for discriminator '{field}'")]
    UnknownVariant { field: String, tag: String },

    /// Polling was aborted by the caller before a terminal state was reached.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ArmError {
    /// Create an HTTP error from a status code and message.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create an [`ArmError::InvalidEndpoint`] that keeps the underlying parse error.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an [`ArmError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Returns `true` for [`ArmError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for Resource Manager operations.
pub type ArmResult<T> = std::result::Result<T, ArmError>;
