//! Authentication services for FHIR clients.
//!
//! Three strategies acquire bearer tokens:
//! - **Managed identity**: platform identity endpoint (IMDS or App Service)
//! - **Client credentials**: OAuth 2.0 grant against a configured token endpoint
//! - **Confidential client**: app registration against an Entra ID style authority

mod client_credentials;
mod confidential;
mod endpoint;
mod error;
mod managed_identity;
mod service;
mod token;

pub use client_credentials::ClientCredentialsAuthService;
pub use confidential::ConfidentialClientAuthService;
pub use error::TokenAcquisitionError;
pub use managed_identity::{IMDS_TOKEN_URL, ManagedIdentityAuthService, ManagedIdentityEndpoint};
pub use service::AuthService;
pub use token::AccessToken;
