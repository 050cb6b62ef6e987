//! OAuth 2.0 client-credentials grant against an arbitrary token endpoint.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::endpoint::{fetch_token, parse_url, required};
use super::{AccessToken, AuthService, TokenAcquisitionError};
use crate::config::{ConfigProvider, keys};

/// Posts `grant_type=client_credentials` to the configured `authority`.
///
/// `resource`, `authority`, `client_id` and `client_secret` are read on
/// every call, so rotated secrets are picked up without rebuilding clients.
#[derive(Clone)]
pub struct ClientCredentialsAuthService {
    config: Arc<dyn ConfigProvider>,
    http: reqwest::Client,
}

impl ClientCredentialsAuthService {
    pub fn new(config: Arc<dyn ConfigProvider>, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

impl fmt::Debug for ClientCredentialsAuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsAuthService")
            .field("config", &self.config.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthService for ClientCredentialsAuthService {
    async fn get_access_token(&self) -> Result<AccessToken, TokenAcquisitionError> {
        let config = self.config.as_ref();
        let resource = required(config, keys::RESOURCE).await?;
        let authority = required(config, keys::AUTHORITY).await?;
        let client_id = required(config, keys::CLIENT_ID).await?;
        let client_secret = SecretString::from(required(config, keys::CLIENT_SECRET).await?);

        let endpoint = parse_url(keys::AUTHORITY, &authority)?;
        tracing::debug!(
            authority = %endpoint,
            client_id = %client_id,
            scope = %resource,
            "Requesting client-credentials token"
        );

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose_secret()),
            ("scope", resource.as_str()),
        ];
        let request = self.http.post(endpoint.clone()).form(&form);

        fetch_token(endpoint.as_str(), request).await
    }

    fn name(&self) -> &'static str {
        "client_credentials"
    }
}
