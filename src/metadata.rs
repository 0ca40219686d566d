//! Instance identity record and the metadata fetch.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::ImdsClient;
use crate::error::MsiError;
use crate::version::InstanceApiVersion;

/// Instance metadata endpoint path.
const INSTANCE_PATH: &str = "/metadata/instance";

/// Identity facts about the running VM.
///
/// # Example
///
/// ```ignore
/// use azure_msi::{ImdsClient, MsiError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), MsiError> {
///     let client = ImdsClient::with_default_settings().map_err(MsiError::Transport)?;
///     let metadata = client.instance_metadata().await?;
///     println!("{} in {}", metadata.name, metadata.resource_group_name);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetadata {
    /// Subscription the VM belongs to.
    pub subscription_id: String,
    /// VM name.
    pub name: String,
    /// Scale set name, empty if the VM is not part of a scale set.
    #[serde(default)]
    pub vm_scale_set_name: String,
    /// Resource group name.
    pub resource_group_name: String,
    /// Unique VM identifier.
    #[serde(default)]
    pub vm_id: String,
    /// Azure region.
    #[serde(default)]
    pub location: String,
}

impl InstanceMetadata {
    /// Whether the VM is part of a virtual machine scale set.
    pub fn is_scale_set_member(&self) -> bool {
        !self.vm_scale_set_name.is_empty()
    }

    /// Decode a response body in the shape `version` returns.
    pub fn from_slice(body: &[u8], version: InstanceApiVersion) -> Result<Self, MsiError> {
        let mut value: Value = serde_json::from_slice(body)?;
        if let Some(key) = version.envelope() {
            value = value
                .get_mut(key)
                .map(Value::take)
                .ok_or_else(|| serde_json::Error::missing_field(key))?;
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl ImdsClient {
    /// Fetch instance metadata using the default API version.
    ///
    /// # Errors
    ///
    /// Returns `MsiError::UnexpectedStatus` for non-2xx responses and
    /// `MsiError::Decode` if the body is not the expected document.
    pub async fn instance_metadata(&self) -> Result<InstanceMetadata, MsiError> {
        self.instance_metadata_for(InstanceApiVersion::default())
            .await
    }

    /// Fetch instance metadata using a specific API version.
    pub async fn instance_metadata_for(
        &self,
        version: InstanceApiVersion,
    ) -> Result<InstanceMetadata, MsiError> {
        self.traced(fetch(self, version)).await
    }
}

async fn fetch(
    client: &ImdsClient,
    version: InstanceApiVersion,
) -> Result<InstanceMetadata, MsiError> {
    let mut url = client.endpoint(INSTANCE_PATH)?;
    url.query_pairs_mut()
        .append_pair("api-version", version.as_str());

    debug!(%version, "fetching instance metadata");
    let body = client.get(url).await?;
    InstanceMetadata::from_slice(&body, version)
}
