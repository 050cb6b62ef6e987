//! # fhir-auth
//!
//! Authenticated clients for FHIR (clinical data) services.
//!
//! A [`ClientFactory`] selects one authentication strategy at startup
//! (managed identity, OAuth client credentials or a confidential client)
//! and produces [`FhirClient`]s that acquire a fresh bearer token for every
//! outbound request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhir_auth::{AuthStrategyConfig, ClientFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fhir_auth::Error> {
//!     // Reads FHIR_SERVICE_URL, FHIR_SERVICE_AUTHORITY, ... from the environment.
//!     let factory = ClientFactory::new(AuthStrategyConfig::client_credentials());
//!     let client = factory.create().await?;
//!
//!     let patient = client.read("Patient", "example").await?;
//!     println!("{}", patient["id"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Strategy selection
//!
//! | `use_managed_identity` | `use_client_credentials` | Strategy |
//! |---|---|---|
//! | `true` | any | managed identity |
//! | `false` | `true` | client credentials |
//! | `false` | `false` | confidential client |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod client;
pub mod config;
pub mod factory;
pub mod observability;

pub use auth::{
    AccessToken, AuthService, ClientCredentialsAuthService, ConfidentialClientAuthService,
    ManagedIdentityAuthService, ManagedIdentityEndpoint, TokenAcquisitionError,
};
pub use client::{BearerTokenHook, FHIR_JSON, FhirClient, RequestHook};
pub use config::{
    AuthStrategy, AuthStrategyConfig, ConfigBuilder, ConfigError, ConfigProvider,
    EnvConfigProvider, MemoryConfigProvider,
};
pub use factory::ClientFactory;

use auth::TokenAcquisitionError as TokenError;

/// Error type for fhir-auth operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or missing configuration detected while building a client.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pre-send hook could not obtain a token; the request was not sent.
    #[error("Token acquisition failed ({strategy}): {source}")]
    TokenAcquisition {
        strategy: &'static str,
        #[source]
        source: TokenError,
    },

    /// FHIR server returned an error response.
    #[error("API error (HTTP {status}): {message}", status = status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".into()))]
    Api {
        message: String,
        status: Option<u16>,
        error_type: Option<String>,
    },

    /// Network connectivity or request failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Request parameters are invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Token rejected or FHIR server refused the caller (401, 403)
    Authorization,
    /// Missing or invalid settings, bad request parameters
    Configuration,
    /// Network or server-side errors that may succeed on retry
    Transient,
    /// Unexpected payloads and other internal failures
    Internal,
}

impl Error {
    pub fn token_acquisition(strategy: &'static str, source: TokenError) -> Self {
        Error::TokenAcquisition { strategy, source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::TokenAcquisition { source, .. } if source.is_configuration_error() => {
                ErrorCategory::Configuration
            }
            Error::TokenAcquisition { .. } => ErrorCategory::Authorization,
            Error::Api {
                status: Some(401 | 403),
                ..
            } => ErrorCategory::Authorization,

            Error::Config(_) | Error::InvalidRequest(_) => ErrorCategory::Configuration,

            Error::Network(_) => ErrorCategory::Transient,
            Error::Api {
                status: Some(500..=599),
                ..
            } => ErrorCategory::Transient,

            Error::Json(_) | Error::Api { .. } => ErrorCategory::Internal,
        }
    }

    pub fn is_authorization_error(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_token_acquisition_error(&self) -> bool {
        matches!(self, Error::TokenAcquisition { .. })
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => *status,
            Error::TokenAcquisition { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::Serialization(e) => Error::Json(e),
            other => Error::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            message: "Resource Patient/1 not found".to_string(),
            status: Some(404),
            error_type: Some("not-found".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "API error (HTTP 404): Resource Patient/1 not found"
        );
    }

    #[test]
    fn test_token_error_names_its_source() {
        let err = Error::token_acquisition(
            "client_credentials",
            TokenError::Rejected {
                error: "invalid_client".into(),
                description: Some("bad secret".into()),
                status: Some(401),
            },
        );
        let message = err.to_string();
        assert!(message.starts_with("Token acquisition failed (client_credentials)"));
        assert!(message.contains("invalid_client"));
        assert!(message.contains("bad secret"));
        assert_eq!(err.category(), ErrorCategory::Authorization);
        assert_eq!(err.status_code(), Some(401));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_missing_token_setting_is_configuration() {
        let err = Error::token_acquisition(
            "client_credentials",
            TokenError::MissingConfiguration { key: "authority" },
        );
        assert!(err.is_configuration_error());
        assert!(err.is_token_acquisition_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_is_retryable() {
        let server_error = Error::Api {
            message: "Internal error".to_string(),
            status: Some(503),
            error_type: None,
        };
        assert!(server_error.is_retryable());

        let forbidden = Error::Api {
            message: "Forbidden".to_string(),
            status: Some(403),
            error_type: None,
        };
        assert!(forbidden.is_authorization_error());
        assert!(!forbidden.is_retryable());
    }

    #[test]
    fn test_config_error_conversion() {
        let config_err = config::ConfigError::InvalidValue {
            key: "url".to_string(),
            message: "relative URL without a base".to_string(),
        };
        let err: Error = config_err.into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_configuration_error());
    }
}
