//! Confidential client (app registration) authentication.
//!
//! Acquires an app-only token from a Microsoft Entra ID style authority:
//! `{authority}/oauth2/v2.0/token` with scope `{resource}/.default`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::endpoint::{fetch_token, parse_url, required, resource_or_url};
use super::{AccessToken, AuthService, TokenAcquisitionError};
use crate::config::{ConfigProvider, keys};

const TOKEN_PATH: &str = "oauth2/v2.0/token";
const DEFAULT_SCOPE_SUFFIX: &str = "/.default";

#[derive(Clone)]
pub struct ConfidentialClientAuthService {
    config: Arc<dyn ConfigProvider>,
    http: reqwest::Client,
}

impl ConfidentialClientAuthService {
    pub fn new(config: Arc<dyn ConfigProvider>, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Token endpoint for an authority. Authorities that already point at a
    /// token endpoint are used as-is.
    pub fn token_endpoint(authority: &str) -> Result<Url, TokenAcquisitionError> {
        let mut url = parse_url(keys::AUTHORITY, authority)?;
        let trimmed = url.path().trim_end_matches('/').to_string();
        if !trimmed.ends_with("/token") {
            url.set_path(&format!("{}/{}", trimmed, TOKEN_PATH));
        }
        Ok(url)
    }

    /// Scope for an app-only token on `resource`.
    pub fn default_scope(resource: &str) -> String {
        if resource.ends_with(DEFAULT_SCOPE_SUFFIX) {
            resource.to_string()
        } else {
            format!("{}{}", resource.trim_end_matches('/'), DEFAULT_SCOPE_SUFFIX)
        }
    }
}

impl fmt::Debug for ConfidentialClientAuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfidentialClientAuthService")
            .field("config", &self.config.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthService for ConfidentialClientAuthService {
    async fn get_access_token(&self) -> Result<AccessToken, TokenAcquisitionError> {
        let config = self.config.as_ref();
        let authority = required(config, keys::AUTHORITY).await?;
        let client_id = required(config, keys::CLIENT_ID).await?;
        let client_secret = SecretString::from(required(config, keys::CLIENT_SECRET).await?);
        let resource = resource_or_url(config).await?;

        let endpoint = Self::token_endpoint(&authority)?;
        let scope = Self::default_scope(&resource);
        tracing::debug!(
            endpoint = %endpoint,
            client_id = %client_id,
            scope = %scope,
            "Requesting confidential client token"
        );

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose_secret()),
            ("scope", scope.as_str()),
        ];
        let request = self.http.post(endpoint.clone()).form(&form);

        fetch_token(endpoint.as_str(), request).await
    }

    fn name(&self) -> &'static str {
        "confidential_client"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigProvider;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_token_endpoint() {
        let url = ConfidentialClientAuthService::token_endpoint(
            "https://login.microsoftonline.com/contoso.onmicrosoft.com",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );

        let url =
            ConfidentialClientAuthService::token_endpoint("https://login.example.com/tenant/")
                .unwrap();
        assert_eq!(url.as_str(), "https://login.example.com/tenant/oauth2/v2.0/token");

        let url = ConfidentialClientAuthService::token_endpoint(
            "https://login.example.com/tenant/oauth2/v2.0/token",
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://login.example.com/tenant/oauth2/v2.0/token");
    }

    #[test]
    fn test_default_scope() {
        assert_eq!(
            ConfidentialClientAuthService::default_scope("https://fhir.example.com/"),
            "https://fhir.example.com/.default"
        );
        assert_eq!(
            ConfidentialClientAuthService::default_scope("api://app/.default"),
            "api://app/.default"
        );
    }

    #[tokio::test]
    async fn test_acquires_token_with_default_scope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-id"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Ffhir.example.com%2F.default",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "app-token",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = MemoryConfigProvider::new()
            .value(keys::URL, "https://fhir.example.com")
            .value(keys::AUTHORITY, format!("{}/tenant", server.uri()))
            .value(keys::CLIENT_ID, "app-id")
            .value(keys::CLIENT_SECRET, "secret");
        let auth = ConfidentialClientAuthService::new(Arc::new(config), reqwest::Client::new());

        let token = auth.get_access_token().await.unwrap();
        assert_eq!(token.secret(), "app-token");
    }

    #[tokio::test]
    async fn test_missing_authority() {
        let config = MemoryConfigProvider::new()
            .value(keys::URL, "https://fhir.example.com")
            .value(keys::CLIENT_ID, "app-id")
            .value(keys::CLIENT_SECRET, "secret");
        let auth = ConfidentialClientAuthService::new(Arc::new(config), reqwest::Client::new());

        let err = auth.get_access_token().await.unwrap_err();
        assert!(matches!(
            err,
            TokenAcquisitionError::MissingConfiguration { key: "authority" }
        ));
    }
}
