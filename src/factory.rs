//! Client factory: strategy selection and client wiring.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use url::Url;

use crate::auth::{
    AuthService, ClientCredentialsAuthService, ConfidentialClientAuthService,
    ManagedIdentityAuthService, ManagedIdentityEndpoint,
};
use crate::client::{self, BearerTokenHook, FhirClient};
use crate::config::{
    AuthStrategy, AuthStrategyConfig, ConfigError, ConfigProvider, ConfigProviderExt,
    fhir_environment, keys,
};
use crate::{Error, Result};

const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

static INSTANCE: LazyLock<ClientFactory> =
    LazyLock::new(|| ClientFactory::new(AuthStrategyConfig::default()));

/// Builds [`FhirClient`]s bound to one authentication strategy.
///
/// The strategy is fixed when the factory is constructed. Connection
/// parameters are read from the configuration store: the service `url`
/// when a client is created, credentials whenever a token is needed.
#[derive(Clone)]
pub struct ClientFactory {
    flags: AuthStrategyConfig,
    config: Arc<dyn ConfigProvider>,
    token_transport: Option<reqwest::Client>,
    managed_identity_endpoint: Option<ManagedIdentityEndpoint>,
    timeout: Option<Duration>,
}

impl ClientFactory {
    /// Process-wide default: both flags off, environment-backed configuration.
    pub fn instance() -> &'static ClientFactory {
        &INSTANCE
    }

    /// Factory reading `FHIR_SERVICE_*` environment variables.
    pub fn new(flags: AuthStrategyConfig) -> Self {
        Self::with_config(flags, Arc::new(fhir_environment()))
    }

    pub fn with_config(flags: AuthStrategyConfig, config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            flags,
            config,
            token_transport: None,
            managed_identity_endpoint: None,
            timeout: None,
        }
    }

    /// Factory whose strategy flags are read from the store itself.
    pub async fn from_config(config: Arc<dyn ConfigProvider>) -> Result<Self> {
        let flags = AuthStrategyConfig::load(config.as_ref()).await?;
        Ok(Self::with_config(flags, config))
    }

    /// Share one HTTP client for token requests instead of building one per auth service.
    pub fn with_token_transport(mut self, http: reqwest::Client) -> Self {
        self.token_transport = Some(http);
        self
    }

    pub fn with_managed_identity_endpoint(mut self, endpoint: ManagedIdentityEndpoint) -> Self {
        self.managed_identity_endpoint = Some(endpoint);
        self
    }

    /// Timeout for FHIR requests and for token requests on a factory-built transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn flags(&self) -> AuthStrategyConfig {
        self.flags
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.flags.select()
    }

    pub fn config(&self) -> &Arc<dyn ConfigProvider> {
        &self.config
    }

    /// Build the auth service for one client.
    pub fn create_auth_service(&self) -> Result<Arc<dyn AuthService>> {
        let strategy = self.strategy();
        let http = self.token_transport()?;
        let config = Arc::clone(&self.config);

        tracing::debug!(
            strategy = %strategy,
            use_managed_identity = self.flags.use_managed_identity,
            use_client_credentials = self.flags.use_client_credentials,
            "Selected authentication strategy"
        );

        Ok(match strategy {
            AuthStrategy::ManagedIdentity => {
                let endpoint = self
                    .managed_identity_endpoint
                    .clone()
                    .unwrap_or_else(ManagedIdentityEndpoint::detect);
                Arc::new(ManagedIdentityAuthService::new(config, http, endpoint))
            }
            AuthStrategy::ClientCredentials => {
                Arc::new(ClientCredentialsAuthService::new(config, http))
            }
            AuthStrategy::ConfidentialClient => {
                Arc::new(ConfidentialClientAuthService::new(config, http))
            }
        })
    }

    /// Create a client for the configured service URL.
    ///
    /// Fails with [`Error::Config`] when the URL is missing or invalid; no
    /// client is built in that case. Credentials are not checked here.
    pub async fn create(&self) -> Result<FhirClient> {
        let base_url = self.service_url().await?;
        let timeout = self.request_timeout().await?;
        let hook = Arc::new(BearerTokenHook::new(self.create_auth_service()?));

        tracing::debug!(url = %base_url, strategy = %self.strategy(), "Creating FHIR client");
        FhirClient::with_timeout(base_url, hook, timeout)
    }

    async fn service_url(&self) -> Result<Url> {
        let raw = self.config.get_string(keys::URL).await?.ok_or_else(|| {
            Error::Config(format!("FHIR service URL ('{}') is not configured", keys::URL))
        })?;

        let url = Url::parse(&raw)
            .map_err(|e| Error::Config(format!("invalid FHIR service URL '{}': {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "FHIR service URL must be http(s), got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    async fn request_timeout(&self) -> Result<Duration> {
        if let Some(timeout) = self.timeout {
            return Ok(timeout);
        }
        match self.config.get::<u64>(keys::REQUEST_TIMEOUT_SECS).await? {
            Some(0) => Err(ConfigError::InvalidValue {
                key: keys::REQUEST_TIMEOUT_SECS.to_string(),
                message: "must be greater than zero".to_string(),
            }
            .into()),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(client::DEFAULT_TIMEOUT),
        }
    }

    fn token_transport(&self) -> Result<reqwest::Client> {
        match &self.token_transport {
            Some(http) => Ok(http.clone()),
            None => reqwest::Client::builder()
                .timeout(self.timeout.unwrap_or(DEFAULT_TOKEN_TIMEOUT))
                .build()
                .map_err(Error::Network),
        }
    }
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("strategy", &self.strategy())
            .field("config", &self.config.name())
            .field("shared_token_transport", &self.token_transport.is_some())
            .field("managed_identity_endpoint", &self.managed_identity_endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}
