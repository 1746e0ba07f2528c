//! Credentials for authenticating against Azure Resource Manager.
//!
//! ARM only accepts Microsoft Entra ID bearer tokens. A token can be supplied
//! directly (useful for CI and tests) or obtained on demand from any
//! [`azure_core::credentials::TokenCredential`].

use crate::error::{ArmError, ArmResult};
use azure_core::credentials::TokenCredential;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

/// OAuth scope for the public-cloud management plane.
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Environment variable holding a pre-acquired access token.
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Credential types supported by the Resource Manager SDK.
#[derive(Clone)]
pub enum ArmCredential {
    /// A pre-acquired bearer token.
    BearerToken(SecretString),

    /// A token credential from `azure_identity` (or any custom implementation)
    /// that is asked for a token on every request.
    TokenCredential {
        credential: Arc<dyn TokenCredential>,
        scope: String,
    },
}

impl ArmCredential {
    /// Create a credential from the `AZURE_ACCESS_TOKEN` environment variable.
    /// Falls back to the Azure CLI credential if the variable is not set.
    pub fn from_env() -> ArmResult<Self> {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.is_empty() => Ok(Self::BearerToken(SecretString::from(token))),
            _ => Self::azure_cli(),
        }
    }

    /// Create a credential from a pre-acquired access token.
    pub fn bearer_token(token: impl Into<String>) -> Self {
        Self::BearerToken(SecretString::from(token.into()))
    }

    /// Use the signed-in Azure CLI account.
    pub fn azure_cli() -> ArmResult<Self> {
        let credential = azure_identity::AzureCliCredential::new(None)
            .map_err(|e| ArmError::Auth(format!("failed to create Azure CLI credential: {e}")))?;
        Ok(Self::token_credential(credential))
    }

    /// Wrap an arbitrary token credential, requesting the ARM scope.
    pub fn token_credential(credential: Arc<dyn TokenCredential>) -> Self {
        Self::TokenCredential {
            credential,
            scope: ARM_SCOPE.to_string(),
        }
    }

    /// Resolve the credential to an authorization header value.
    pub async fn resolve(&self) -> ArmResult<String> {
        match self {
            Self::BearerToken(token) => Ok(format!("Bearer {}", token.expose_secret())),
            Self::TokenCredential { credential, scope } => {
                let token = credential
                    .get_token(&[scope.as_str()], None)
                    .await
                    .map_err(|e| ArmError::Auth(e.to_string()))?;
                Ok(format!("Bearer {}", token.token.secret()))
            }
        }
    }
}

impl std::fmt::Debug for ArmCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BearerToken(_) => write!(f, "ArmCredential::BearerToken(****)"),
            Self::TokenCredential { scope, .. } => {
                write!(f, "ArmCredential::TokenCredential {{ scope: {scope} }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_core::credentials::{AccessToken, Secret, TokenRequestOptions};
    use azure_core::time::{Duration as AzureDuration, OffsetDateTime};
    use serial_test::serial;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeCredential {
        requested_scopes: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl TokenCredential for FakeCredential {
        async fn get_token(
            &self,
            scopes: &[&str],
            _options: Option<TokenRequestOptions<'_>>,
        ) -> azure_core::Result<AccessToken> {
            self.requested_scopes
                .lock()
                .unwrap()
                .extend(scopes.iter().map(|s| s.to_string()));
            Ok(AccessToken::new(
                Secret::new("fake-entra-token"),
                OffsetDateTime::now_utc() + AzureDuration::hours(1),
            ))
        }
    }

    #[tokio::test]
    async fn bearer_token_resolves_to_header() {
        let credential = ArmCredential::bearer_token("abc");
        assert_eq!(credential.resolve().await.unwrap(), "Bearer abc");
    }

    #[tokio::test]
    async fn token_credential_requests_arm_scope() {
        let fake = Arc::new(FakeCredential::default());
        let credential = ArmCredential::token_credential(fake.clone());

        let header = credential.resolve().await.unwrap();

        assert_eq!(header, "Bearer fake-entra-token");
        assert_eq!(
            fake.requested_scopes.lock().unwrap().as_slice(),
            &[ARM_SCOPE.to_string()]
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let credential = ArmCredential::bearer_token("super-secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("****"));
    }

    #[test]
    #[serial]
    fn from_env_prefers_access_token() {
        let original = std::env::var(ACCESS_TOKEN_ENV).ok();
        std::env::set_var(ACCESS_TOKEN_ENV, "env-token");

        let credential = ArmCredential::from_env().expect("should build");
        assert!(matches!(credential, ArmCredential::BearerToken(_)));

        match original {
            Some(val) => std::env::set_var(ACCESS_TOKEN_ENV, val),
            None => std::env::remove_var(ACCESS_TOKEN_ENV),
        }
    }
}
