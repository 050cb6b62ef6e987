//! Authentication service trait.

use std::fmt::Debug;

use async_trait::async_trait;

use super::{AccessToken, TokenAcquisitionError};

/// Source of bearer tokens for outgoing FHIR requests.
///
/// Implementations are shared across concurrent requests and read their
/// configuration on every call; nothing is cached between calls.
#[async_trait]
pub trait AuthService: Send + Sync + Debug {
    /// Obtain an access token for the configured resource.
    async fn get_access_token(&self) -> Result<AccessToken, TokenAcquisitionError>;

    /// Strategy name for logging/debugging.
    fn name(&self) -> &'static str;
}
