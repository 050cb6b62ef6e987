//! Token endpoint plumbing shared by the auth services.

use reqwest::RequestBuilder;
use serde::Deserialize;
use url::Url;

use super::{AccessToken, TokenAcquisitionError};
use crate::config::{ConfigProvider, ConfigProviderExt, keys};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Send a token request and turn the response into an [`AccessToken`].
pub(crate) async fn fetch_token(
    endpoint: &str,
    request: RequestBuilder,
) -> Result<AccessToken, TokenAcquisitionError> {
    let response = request
        .send()
        .await
        .map_err(|source| TokenAcquisitionError::Unreachable {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| TokenAcquisitionError::Unreachable {
            endpoint: endpoint.to_string(),
            source,
        })?;

    parse_token_response(status.as_u16(), &body)
}

pub(crate) fn parse_token_response(
    status: u16,
    body: &str,
) -> Result<AccessToken, TokenAcquisitionError> {
    let success = (200..300).contains(&status);
    let parsed = serde_json::from_str::<TokenResponse>(body).ok();

    match parsed {
        Some(TokenResponse {
            error: Some(error),
            error_description,
            ..
        }) => {
            tracing::warn!(status, error = %error, "Token request rejected");
            Err(TokenAcquisitionError::Rejected {
                error,
                description: error_description,
                status: Some(status),
            })
        }
        _ if !success => Err(TokenAcquisitionError::UnexpectedResponse {
            status,
            body: body.to_string(),
        }),
        Some(TokenResponse {
            access_token: Some(token),
            ..
        }) if !token.is_empty() => Ok(AccessToken::new(token)),
        Some(_) => Err(TokenAcquisitionError::InvalidResponse(
            "response did not contain an access_token".into(),
        )),
        None => Err(TokenAcquisitionError::InvalidResponse(
            "response body is not a JSON token document".into(),
        )),
    }
}

/// Look up a setting that must be present at token time.
pub(crate) async fn required(
    config: &dyn ConfigProvider,
    key: &'static str,
) -> Result<String, TokenAcquisitionError> {
    config
        .get_string(key)
        .await?
        .ok_or(TokenAcquisitionError::MissingConfiguration { key })
}

/// Token audience: `resource`, falling back to the service `url`.
pub(crate) async fn resource_or_url(
    config: &dyn ConfigProvider,
) -> Result<String, TokenAcquisitionError> {
    if let Some(resource) = config.get_string(keys::RESOURCE).await? {
        return Ok(resource);
    }
    config
        .get_string(keys::URL)
        .await?
        .ok_or(TokenAcquisitionError::MissingConfiguration {
            key: keys::RESOURCE,
        })
}

pub(crate) fn parse_url(key: &'static str, value: &str) -> Result<Url, TokenAcquisitionError> {
    Url::parse(value).map_err(|e| TokenAcquisitionError::InvalidConfiguration {
        key,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigProvider;

    #[test]
    fn test_parse_success() {
        let token =
            parse_token_response(200, r#"{"access_token":"abc","token_type":"Bearer","expires_in":3599}"#)
                .unwrap();
        assert_eq!(token.secret(), "abc");
    }

    #[test]
    fn test_parse_oauth_error() {
        let err = parse_token_response(
            400,
            r#"{"error":"invalid_client","error_description":"bad secret"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Failed to retrieve token: invalid_client - bad secret.");
    }

    #[test]
    fn test_parse_error_document_with_success_status() {
        let err = parse_token_response(200, r#"{"error":"invalid_scope"}"#).unwrap_err();
        assert!(matches!(err, TokenAcquisitionError::Rejected { .. }));
    }

    #[test]
    fn test_parse_non_json_failure() {
        let err = parse_token_response(502, "<html>Bad Gateway</html>").unwrap_err();
        match err {
            TokenAcquisitionError::UnexpectedResponse { status, body } => {
                assert_eq!(status, 502);
                assert!(body.contains("Bad Gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_or_empty_token() {
        assert!(matches!(
            parse_token_response(200, r#"{"token_type":"Bearer"}"#),
            Err(TokenAcquisitionError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_token_response(200, r#"{"access_token":""}"#),
            Err(TokenAcquisitionError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_token_response(200, "not json"),
            Err(TokenAcquisitionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_resource_falls_back_to_url() {
        let config = MemoryConfigProvider::new().value(keys::URL, "https://fhir.example.com");
        assert_eq!(
            resource_or_url(&config).await.unwrap(),
            "https://fhir.example.com"
        );

        let config = MemoryConfigProvider::new()
            .value(keys::URL, "https://fhir.example.com")
            .value(keys::RESOURCE, "https://audience.example.com");
        assert_eq!(
            resource_or_url(&config).await.unwrap(),
            "https://audience.example.com"
        );

        let err = resource_or_url(&MemoryConfigProvider::new()).await.unwrap_err();
        assert!(matches!(
            err,
            TokenAcquisitionError::MissingConfiguration { key: "resource" }
        ));
    }

    #[tokio::test]
    async fn test_required_rejects_blank() {
        let config = MemoryConfigProvider::new().value(keys::CLIENT_ID, "   ");
        let err = required(&config, keys::CLIENT_ID).await.unwrap_err();
        assert!(matches!(
            err,
            TokenAcquisitionError::MissingConfiguration { key: "client_id" }
        ));
    }
}
