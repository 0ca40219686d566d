//! Minimal Rust crate for fetching Azure VM identity data from the instance metadata service.
//!
//! Two link-local endpoints are covered:
//!
//! - the instance metadata endpoint, which describes the running VM
//!   (subscription, name, scale set, resource group)
//! - the managed identity token endpoint, which issues OAuth2 access tokens
//!   for the VM's identity
//!
//! Every call is a single GET with the `Metadata: true` header. Nothing is
//! cached or retried; callers decide what to do with failures.
//!
//! # Example
//!
//! ```ignore
//! use azure_msi::{ImdsClient, InstanceApiVersion, MsiError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ImdsClient::with_default_settings()?;
//!
//!     let metadata = client.instance_metadata_for(InstanceApiVersion::V2021_02_01).await?;
//!     println!("running as {} in {}", metadata.name, metadata.subscription_id);
//!
//!     let token = client.management_token().await?;
//!     println!("token expires at {}", token.expires_on);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events but never installs a subscriber. Pass a
//! dispatcher with [`ImdsClient::with_dispatch`] to capture a single client's
//! events, or install your own default.

mod client;
mod error;
mod metadata;
mod token;
mod version;

pub use client::{ImdsClient, DEFAULT_BASE_URL};
pub use error::{BuildError, MsiError};
pub use metadata::InstanceMetadata;
pub use token::{AccessToken, ManagedIdentity, DEFAULT_RESOURCE};
pub use version::InstanceApiVersion;

/// Fetch instance metadata from the well-known endpoint with a fresh client.
pub async fn fetch_instance_metadata() -> Result<InstanceMetadata, MsiError> {
    default_client()?.instance_metadata().await
}

/// Fetch a token for `resource` from the well-known endpoint with a fresh client.
pub async fn fetch_access_token(resource: &str) -> Result<AccessToken, MsiError> {
    default_client()?.access_token(resource).await
}

fn default_client() -> Result<ImdsClient, MsiError> {
    ImdsClient::with_default_settings().map_err(|e| MsiError::RequestBuild(Box::new(e)))
}
