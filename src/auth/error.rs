//! Token acquisition errors.

use thiserror::Error;

use crate::config::ConfigError;

/// Failure to obtain an access token from an identity provider.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenAcquisitionError {
    /// A setting required at token time is absent or blank.
    #[error("Missing configuration value '{key}'")]
    MissingConfiguration { key: &'static str },

    /// A setting is present but unusable (for example, not a URL).
    #[error("Invalid configuration value '{key}': {message}")]
    InvalidConfiguration { key: &'static str, message: String },

    /// The identity provider answered with an OAuth error document.
    #[error("Failed to retrieve token: {error} - {}.", description.as_deref().unwrap_or(""))]
    Rejected {
        error: String,
        description: Option<String>,
        status: Option<u16>,
    },

    /// The token endpoint could not be reached.
    #[error("Token endpoint {endpoint} unreachable: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status without a recognizable error document.
    #[error("Token endpoint returned HTTP {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// Success status, but no usable token in the body.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TokenAcquisitionError {
    /// Whether the failure comes from local configuration rather than the identity provider.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingConfiguration { .. } | Self::InvalidConfiguration { .. } | Self::Config(_)
        )
    }

    /// HTTP status reported by the identity provider, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => *status,
            Self::UnexpectedResponse { status, .. } => Some(*status),
            Self::Unreachable { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// OAuth error code (`invalid_client`, ...) when the provider sent one.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }
}
