//! Managed identity authentication.
//!
//! Tokens come from the hosting platform's identity endpoint, so no secret
//! is configured. App Service / Functions expose `IDENTITY_ENDPOINT` and
//! `IDENTITY_HEADER`; virtual machines use the instance metadata service.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::endpoint::{fetch_token, resource_or_url};
use super::{AccessToken, AuthService, TokenAcquisitionError};
use crate::config::{ConfigProvider, ConfigProviderExt, keys};

pub const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

const IDENTITY_ENDPOINT_VAR: &str = "IDENTITY_ENDPOINT";
const IDENTITY_HEADER_VAR: &str = "IDENTITY_HEADER";

/// Where managed identity tokens are requested.
#[derive(Clone, PartialEq, Eq)]
pub enum ManagedIdentityEndpoint {
    /// Instance metadata service (`Metadata: true`).
    Imds { url: String },
    /// App Service style endpoint guarded by `X-IDENTITY-HEADER`.
    AppService { url: String, header: String },
}

impl ManagedIdentityEndpoint {
    pub fn imds() -> Self {
        Self::Imds {
            url: IMDS_TOKEN_URL.to_string(),
        }
    }

    pub fn imds_at(url: impl Into<String>) -> Self {
        Self::Imds { url: url.into() }
    }

    pub fn app_service(url: impl Into<String>, header: impl Into<String>) -> Self {
        Self::AppService {
            url: url.into(),
            header: header.into(),
        }
    }

    /// Detect the endpoint from the process environment.
    pub fn detect() -> Self {
        match (
            std::env::var(IDENTITY_ENDPOINT_VAR),
            std::env::var(IDENTITY_HEADER_VAR),
        ) {
            (Ok(url), Ok(header)) if !url.trim().is_empty() && !header.is_empty() => {
                Self::app_service(url.trim(), header)
            }
            _ => Self::imds(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Imds { url } | Self::AppService { url, .. } => url,
        }
    }

    fn api_version(&self) -> &'static str {
        match self {
            Self::Imds { .. } => IMDS_API_VERSION,
            Self::AppService { .. } => APP_SERVICE_API_VERSION,
        }
    }

    /// Token request URL for `resource`, optionally for a user-assigned identity.
    pub fn request_url(
        &self,
        resource: &str,
        client_id: Option<&str>,
    ) -> Result<Url, TokenAcquisitionError> {
        let mut url = Url::parse(self.url()).map_err(|e| {
            TokenAcquisitionError::InvalidConfiguration {
                key: IDENTITY_ENDPOINT_VAR,
                message: e.to_string(),
            }
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", self.api_version());
            query.append_pair("resource", resource);
            if let Some(client_id) = client_id {
                query.append_pair("client_id", client_id);
            }
        }
        Ok(url)
    }
}

impl Default for ManagedIdentityEndpoint {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Debug for ManagedIdentityEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imds { url } => f.debug_struct("Imds").field("url", url).finish(),
            Self::AppService { url, .. } => f
                .debug_struct("AppService")
                .field("url", url)
                .field("header", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Clone)]
pub struct ManagedIdentityAuthService {
    config: Arc<dyn ConfigProvider>,
    http: reqwest::Client,
    endpoint: ManagedIdentityEndpoint,
}

impl ManagedIdentityAuthService {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        http: reqwest::Client,
        endpoint: ManagedIdentityEndpoint,
    ) -> Self {
        Self {
            config,
            http,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &ManagedIdentityEndpoint {
        &self.endpoint
    }
}

impl fmt::Debug for ManagedIdentityAuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedIdentityAuthService")
            .field("config", &self.config.name())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthService for ManagedIdentityAuthService {
    async fn get_access_token(&self) -> Result<AccessToken, TokenAcquisitionError> {
        let config = self.config.as_ref();
        let resource = resource_or_url(config).await?;
        let client_id = config.get_string(keys::MANAGED_IDENTITY_CLIENT_ID).await?;

        let url = self.endpoint.request_url(&resource, client_id.as_deref())?;
        tracing::debug!(
            endpoint = %self.endpoint.url(),
            resource = %resource,
            user_assigned = client_id.is_some(),
            "Requesting managed identity token"
        );

        let request = self.http.get(url);
        let request = match &self.endpoint {
            ManagedIdentityEndpoint::Imds { .. } => request.header("Metadata", "true"),
            ManagedIdentityEndpoint::AppService { header, .. } => {
                request.header("X-IDENTITY-HEADER", header.as_str())
            }
        };

        fetch_token(self.endpoint.url(), request).await
    }

    fn name(&self) -> &'static str {
        "managed_identity"
    }
}
