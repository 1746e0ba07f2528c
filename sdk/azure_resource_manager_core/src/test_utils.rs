//! Helpers for testing code built on [`ArmClient`] against a `wiremock` server.
//!
//! Enabled for sibling crates through the `test-support` feature.

use crate::auth::ArmCredential;
use crate::client::ArmClient;
use wiremock::MockServer;

/// Test access token (not a real token).
pub const TEST_TOKEN: &str = "test-access-token";

/// Subscription id used in test paths.
pub const TEST_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Create a test client connected to a mock server.
pub async fn setup_mock_client(server: &MockServer) -> ArmClient {
    ArmClient::builder()
        .endpoint(server.uri())
        .subscription_id(TEST_SUBSCRIPTION_ID)
        .credential(ArmCredential::bearer_token(TEST_TOKEN))
        .build()
        .expect("should build client")
}
