//! FHIR service connection settings and authentication strategy selection.

use std::fmt;

use super::env::EnvConfigProvider;
use super::provider::{ConfigProvider, ConfigProviderExt};
use super::ConfigResult;

/// Prefix for FHIR service environment variables (`FHIR_SERVICE_URL`, ...).
pub const ENV_PREFIX: &str = "FHIR_SERVICE_";

/// Configuration keys understood by the client factory and auth services.
pub mod keys {
    /// Base URL of the FHIR service.
    pub const URL: &str = "url";
    /// Resource (audience) the token is requested for.
    pub const RESOURCE: &str = "resource";
    /// OAuth authority / token endpoint.
    pub const AUTHORITY: &str = "authority";
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    /// Client id of a user-assigned managed identity.
    pub const MANAGED_IDENTITY_CLIENT_ID: &str = "managed_identity_client_id";
    pub const USE_MANAGED_IDENTITY: &str = "use_managed_identity";
    pub const USE_CLIENT_CREDENTIALS: &str = "use_client_credentials";
    /// Timeout in seconds applied to FHIR and token requests.
    pub const REQUEST_TIMEOUT_SECS: &str = "request_timeout_secs";
}

/// Parse a boolean flag value: `1` or `true` (case-insensitive).
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Environment provider reading `FHIR_SERVICE_*` variables.
pub fn fhir_environment() -> EnvConfigProvider {
    EnvConfigProvider::prefixed(ENV_PREFIX)
}

/// Authentication strategy bound to a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthStrategy {
    /// Platform identity endpoint, no stored secret.
    ManagedIdentity,
    /// OAuth client-credentials grant against the configured authority.
    ClientCredentials,
    /// Confidential client (app registration) against an Entra ID style authority.
    ConfidentialClient,
}

impl AuthStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ManagedIdentity => "managed_identity",
            Self::ClientCredentials => "client_credentials",
            Self::ConfidentialClient => "confidential_client",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flags selecting the authentication strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthStrategyConfig {
    pub use_managed_identity: bool,
    pub use_client_credentials: bool,
}

impl AuthStrategyConfig {
    pub fn new(use_managed_identity: bool, use_client_credentials: bool) -> Self {
        Self {
            use_managed_identity,
            use_client_credentials,
        }
    }

    pub fn managed_identity() -> Self {
        Self::new(true, false)
    }

    pub fn client_credentials() -> Self {
        Self::new(false, true)
    }

    /// Read both flags from a configuration store; absent flags are `false`.
    pub async fn load(config: &dyn ConfigProvider) -> ConfigResult<Self> {
        Ok(Self {
            use_managed_identity: config.get_flag(keys::USE_MANAGED_IDENTITY).await?,
            use_client_credentials: config.get_flag(keys::USE_CLIENT_CREDENTIALS).await?,
        })
    }

    /// Managed identity wins over client credentials; confidential client is the default.
    pub fn select(&self) -> AuthStrategy {
        if self.use_managed_identity {
            AuthStrategy::ManagedIdentity
        } else if self.use_client_credentials {
            AuthStrategy::ClientCredentials
        } else {
            AuthStrategy::ConfidentialClient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigProvider;

    #[test]
    fn test_select_precedence() {
        let cases = [
            (false, false, AuthStrategy::ConfidentialClient),
            (false, true, AuthStrategy::ClientCredentials),
            (true, false, AuthStrategy::ManagedIdentity),
            (true, true, AuthStrategy::ManagedIdentity),
        ];

        for (mi, cc, expected) in cases {
            assert_eq!(
                AuthStrategyConfig::new(mi, cc).select(),
                expected,
                "use_managed_identity={mi}, use_client_credentials={cc}"
            );
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(parse_flag(" True "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag(""));
    }

    #[tokio::test]
    async fn test_load_from_config() {
        let config = MemoryConfigProvider::new().value(keys::USE_CLIENT_CREDENTIALS, "true");
        let flags = AuthStrategyConfig::load(&config).await.unwrap();

        assert_eq!(flags, AuthStrategyConfig::client_credentials());
        assert_eq!(flags.select().name(), "client_credentials");
    }

    #[tokio::test]
    async fn test_load_defaults_to_confidential_client() {
        let flags = AuthStrategyConfig::load(&MemoryConfigProvider::new())
            .await
            .unwrap();
        assert_eq!(flags, AuthStrategyConfig::default());
        assert_eq!(flags.select(), AuthStrategy::ConfidentialClient);
    }

    #[test]
    fn test_fhir_environment_prefix() {
        assert_eq!(
            fhir_environment().env_key(keys::CLIENT_SECRET),
            "FHIR_SERVICE_CLIENT_SECRET"
        );
    }
}
