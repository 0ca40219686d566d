//! Managed identity access tokens.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ImdsClient;
use crate::error::MsiError;

/// Managed identity token endpoint path.
const TOKEN_PATH: &str = "/metadata/identity/oauth2/token";

/// Token endpoint API version.
const API_VERSION: &str = "2018-02-01";

/// Resource requested when the caller does not name one.
pub const DEFAULT_RESOURCE: &str = "https://management.azure.com/";

/// Which managed identity the token is issued for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ManagedIdentity {
    /// The VM's system-assigned identity.
    #[default]
    SystemAssigned,
    /// A user-assigned identity selected by client id.
    ClientId(String),
    /// A user-assigned identity selected by object id.
    ObjectId(String),
    /// A user-assigned identity selected by ARM resource id.
    ResourceId(String),
}

impl ManagedIdentity {
    /// Query parameter selecting this identity, if any.
    pub fn query_pair(&self) -> Option<(&'static str, &str)> {
        match self {
            ManagedIdentity::SystemAssigned => None,
            ManagedIdentity::ClientId(id) => Some(("client_id", id.as_str())),
            ManagedIdentity::ObjectId(id) => Some(("object_id", id.as_str())),
            ManagedIdentity::ResourceId(id) => Some(("msi_res_id", id.as_str())),
        }
    }
}

/// A bearer token issued by the managed identity endpoint.
///
/// Every field is a string on the wire, timestamps included. Nothing here is
/// cached; each fetch returns a new token.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime in seconds.
    pub expires_in: String,
    /// Expiry, seconds since the Unix epoch.
    pub expires_on: String,
    /// Start of validity, seconds since the Unix epoch.
    pub not_before: String,
    pub resource: String,
    pub token_type: String,
}

impl AccessToken {
    /// Expiry as seconds since the Unix epoch, if the service sent a number.
    pub fn expires_on_unix(&self) -> Option<u64> {
        self.expires_on.trim().parse().ok()
    }

    /// Whether the token has expired at `now` (seconds since the Unix epoch).
    ///
    /// A token with an unparseable expiry is treated as expired.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_on_unix().map_or(true, |exp| now >= exp)
    }

    /// Value for an `Authorization` header, e.g. `Bearer eyJ0...`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("expires_on", &self.expires_on)
            .field("not_before", &self.not_before)
            .field("resource", &self.resource)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl ImdsClient {
    /// Fetch a token for `resource` using the system-assigned identity.
    ///
    /// # Errors
    ///
    /// Returns `MsiError::UnexpectedStatus` for non-2xx responses (the body
    /// usually carries the service's `error_description`) and
    /// `MsiError::Decode` if the body is not a token document.
    pub async fn access_token(&self, resource: &str) -> Result<AccessToken, MsiError> {
        self.access_token_for(resource, &ManagedIdentity::SystemAssigned)
            .await
    }

    /// Fetch a token for `resource` issued to `identity`.
    pub async fn access_token_for(
        &self,
        resource: &str,
        identity: &ManagedIdentity,
    ) -> Result<AccessToken, MsiError> {
        self.traced(fetch(self, resource, identity)).await
    }

    /// Fetch a token for the resource management API.
    pub async fn management_token(&self) -> Result<AccessToken, MsiError> {
        self.access_token(DEFAULT_RESOURCE).await
    }
}

async fn fetch(
    client: &ImdsClient,
    resource: &str,
    identity: &ManagedIdentity,
) -> Result<AccessToken, MsiError> {
    let mut url = client.endpoint(TOKEN_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("api-version", API_VERSION)
            .append_pair("resource", resource);
        if let Some((key, value)) = identity.query_pair() {
            query.append_pair(key, value);
        }
    }

    debug!(resource, ?identity, "fetching managed identity token");
    let body = client.get(url).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = r#"{
        "access_token": "eyJ0eXAi.payload.sig",
        "refresh_token": "",
        "expires_in": "3599",
        "expires_on": "1506484173",
        "not_before": "1506480273",
        "resource": "https://management.azure.com/",
        "token_type": "Bearer"
    }"#;

    #[test]
    fn test_constants() {
        assert_eq!(TOKEN_PATH, "/metadata/identity/oauth2/token");
        assert_eq!(API_VERSION, "2018-02-01");
        assert_eq!(DEFAULT_RESOURCE, "https://management.azure.com/");
    }

    #[test]
    fn test_decode_token() {
        let token: AccessToken = serde_json::from_str(TOKEN).unwrap();
        assert_eq!(token.access_token, "eyJ0eXAi.payload.sig");
        assert_eq!(token.refresh_token, "");
        assert_eq!(token.expires_in, "3599");
        assert_eq!(token.expires_on, "1506484173");
        assert_eq!(token.not_before, "1506480273");
        assert_eq!(token.resource, DEFAULT_RESOURCE);
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn test_numeric_timestamps_rejected() {
        let body = TOKEN.replace(r#""1506484173""#, "1506484173");
        assert!(serde_json::from_str::<AccessToken>(&body).is_err());
    }

    #[test]
    fn test_expiry() {
        let token: AccessToken = serde_json::from_str(TOKEN).unwrap();
        assert_eq!(token.expires_on_unix(), Some(1506484173));
        assert!(!token.is_expired_at(1506484172));
        assert!(token.is_expired_at(1506484173));

        let garbled = AccessToken {
            expires_on: "soon".to_string(),
            ..token
        };
        assert_eq!(garbled.expires_on_unix(), None);
        assert!(garbled.is_expired_at(0));
    }

    #[test]
    fn test_authorization_header() {
        let token: AccessToken = serde_json::from_str(TOKEN).unwrap();
        assert_eq!(token.authorization_header(), "Bearer eyJ0eXAi.payload.sig");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token: AccessToken = serde_json::from_str(TOKEN).unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("eyJ0eXAi"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("1506484173"));
    }

    #[test]
    fn test_identity_query_pair() {
        assert_eq!(ManagedIdentity::SystemAssigned.query_pair(), None);
        assert_eq!(
            ManagedIdentity::ClientId("abc".to_string()).query_pair(),
            Some(("client_id", "abc"))
        );
        assert_eq!(
            ManagedIdentity::ObjectId("def".to_string()).query_pair(),
            Some(("object_id", "def"))
        );
        assert_eq!(
            ManagedIdentity::ResourceId("/subscriptions/x".to_string()).query_pair(),
            Some(("msi_res_id", "/subscriptions/x"))
        );
    }
}
