//! Pre-send request hooks.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};

use crate::auth::{AuthService, TokenAcquisitionError};
use crate::{Error, Result};

/// Runs on every request after it is built and before it is transmitted.
///
/// Returning an error aborts the request; nothing reaches the wire.
#[async_trait]
pub trait RequestHook: Send + Sync + Debug {
    fn name(&self) -> &str;

    async fn before_send(&self, request: &mut reqwest::Request) -> Result<()>;
}

/// Stamps `Authorization: Bearer <token>` with a freshly acquired token.
#[derive(Debug, Clone)]
pub struct BearerTokenHook {
    auth: Arc<dyn AuthService>,
}

impl BearerTokenHook {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        Self { auth }
    }

    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.auth
    }

    fn failure(&self, source: TokenAcquisitionError) -> Error {
        tracing::warn!(strategy = self.auth.name(), error = %source, "Token acquisition failed");
        Error::token_acquisition(self.auth.name(), source)
    }
}

#[async_trait]
impl RequestHook for BearerTokenHook {
    fn name(&self) -> &str {
        self.auth.name()
    }

    async fn before_send(&self, request: &mut reqwest::Request) -> Result<()> {
        let token = self
            .auth
            .get_access_token()
            .await
            .map_err(|e| self.failure(e))?;

        if token.is_empty() {
            return Err(self.failure(TokenAcquisitionError::InvalidResponse(
                "empty access token".into(),
            )));
        }

        let mut value = HeaderValue::from_str(&token.bearer()).map_err(|e| {
            self.failure(TokenAcquisitionError::InvalidResponse(format!(
                "token is not a valid header value: {e}"
            )))
        })?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);

        tracing::trace!(strategy = self.auth.name(), url = %request.url(), "Attached bearer token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessToken;

    #[derive(Debug)]
    struct StaticAuth(Option<&'static str>);

    #[async_trait]
    impl AuthService for StaticAuth {
        async fn get_access_token(&self) -> std::result::Result<AccessToken, TokenAcquisitionError> {
            match self.0 {
                Some(token) => Ok(AccessToken::new(token)),
                None => Err(TokenAcquisitionError::Rejected {
                    error: "invalid_client".into(),
                    description: Some("bad secret".into()),
                    status: Some(401),
                }),
            }
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    fn request() -> reqwest::Request {
        reqwest::Client::new()
            .get("https://fhir.example.com/Patient/1")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sets_sensitive_bearer_header() {
        let hook = BearerTokenHook::new(Arc::new(StaticAuth(Some("tok-1"))));
        let mut req = request();
        hook.before_send(&mut req).await.unwrap();

        let value = req.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer tok-1");
        assert!(value.is_sensitive());
        assert_eq!(hook.name(), "static");
    }

    #[tokio::test]
    async fn test_failure_leaves_request_untouched() {
        let hook = BearerTokenHook::new(Arc::new(StaticAuth(None)));
        let mut req = request();
        let err = hook.before_send(&mut req).await.unwrap_err();

        assert!(err.is_token_acquisition_error());
        assert!(err.to_string().contains("invalid_client"));
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let hook = BearerTokenHook::new(Arc::new(StaticAuth(Some(""))));
        let err = hook.before_send(&mut request()).await.unwrap_err();
        assert!(err.is_token_acquisition_error());
    }
}
