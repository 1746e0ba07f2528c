//! # Azure Resource Manager Resources
//!
//! Resource groups and template deployments for the Azure Resource Manager
//! Rust SDK.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azure_resource_manager_core::auth::ArmCredential;
//! use azure_resource_manager_core::client::ArmClient;
//! use azure_resource_manager_resources::deployment::DeploymentRequest;
//! use azure_resource_manager_resources::orchestrator::DeploymentOrchestrator;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ArmClient::builder()
//!         .subscription_id("00000000-0000-0000-0000-000000000000")
//!         .credential(ArmCredential::from_env()?)
//!         .build()?;
//!
//!     let request = DeploymentRequest::builder()
//!         .resource_group("my-rg")
//!         .template_link("https://example.com/templates/azuredeploy.json")
//!         .parameter("siteName", "my-site")
//!         .build()?;
//!
//!     let summary = DeploymentOrchestrator::new(&client)
//!         .execute_deployment(&request, Some("westeurope"), Duration::from_secs(5), &CancellationToken::new())
//!         .await?;
//!     println!("{:?}", summary.provisioning_state);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`resource_group`] - Check, create, get, list and delete resource groups
//! - [`deployment`] - Build, validate, submit, inspect and cancel deployments
//! - [`deployment_operation`] - Per-resource operations of a deployment
//! - [`reporter`] - Progress and failure lines for deployment operations
//! - [`projection`] - Flat summaries with override hooks
//! - [`orchestrator`] - The end-to-end deployment workflow

pub mod deployment;
pub mod deployment_operation;
pub mod models;
pub mod orchestrator;
pub mod projection;
pub mod reporter;
pub mod resource_group;
