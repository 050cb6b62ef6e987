//! FHIR REST client with per-request authentication.

mod hook;
mod outcome;

pub use hook::{BearerTokenHook, RequestHook};

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::Instrument;
use url::Url;

use crate::observability::RequestSpan;
use crate::{Error, Result};

/// FHIR JSON media type, used for `Accept` and request bodies.
pub const FHIR_JSON: &str = "application/fhir+json";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Wire client bound to one FHIR base URL and one pre-send hook.
#[derive(Clone, Debug)]
pub struct FhirClient {
    base_url: Url,
    http: reqwest::Client,
    hook: Arc<dyn RequestHook>,
}

impl FhirClient {
    pub fn new(base_url: Url, hook: Arc<dyn RequestHook>) -> Result<Self> {
        Self::with_timeout(base_url, hook, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: Url,
        hook: Arc<dyn RequestHook>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(Error::Network)?;

        Ok(Self::with_http(base_url, http, hook))
    }

    pub fn with_http(base_url: Url, http: reqwest::Client, hook: Arc<dyn RequestHook>) -> Self {
        Self {
            base_url: normalize_base(base_url),
            http,
            hook,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn hook(&self) -> &Arc<dyn RequestHook> {
        &self.hook
    }

    /// Name of the authentication strategy stamping this client's requests.
    pub fn auth_strategy(&self) -> &str {
        self.hook.name()
    }

    /// Resolve a path relative to the service base URL.
    ///
    /// Paths that resolve outside the base URL (another origin, or above the
    /// base path) are rejected so the bearer token never leaves the service.
    pub fn url(&self, path: &str) -> Result<Url> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidRequest(format!("invalid path '{}': {}", path, e)))?;
        self.ensure_in_scope(&url)?;
        Ok(url)
    }

    fn ensure_in_scope(&self, url: &Url) -> Result<()> {
        if url.origin() == self.base_url.origin() && url.path().starts_with(self.base_url.path()) {
            return Ok(());
        }
        Err(Error::InvalidRequest(format!(
            "URL '{}' is outside the FHIR service base '{}'",
            url, self.base_url
        )))
    }

    /// Start a request against `path`; send it with [`execute`](Self::execute).
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(path)?)
            .header(ACCEPT, FHIR_JSON))
    }

    /// Run the pre-send hook, then transmit. The response status is not checked.
    ///
    /// Requests addressed outside the base URL fail before a token is acquired.
    pub async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        self.ensure_in_scope(request.url())?;

        let span = RequestSpan::new(
            request.method().as_str(),
            request.url().as_str(),
            self.hook.name(),
        );

        let result = async {
            self.hook.before_send(&mut request).await?;
            Ok::<_, Error>(self.http.execute(request).await?)
        }
        .instrument(span.span().clone())
        .await;

        match &result {
            Ok(response) => span.record_status(response.status().as_u16()),
            Err(e) => span.record_error(e),
        }
        let latency_ms = span.finish();
        tracing::debug!(latency_ms, ok = result.is_ok(), "FHIR request completed");

        result
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = self.execute(builder.build()?).await?;
        outcome::check_response(response).await
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn read(&self, resource_type: &str, id: &str) -> Result<Value> {
        let builder = self.request(Method::GET, &format!("{}/{}", resource_type, id))?;
        self.send_json(builder).await
    }

    pub async fn search(&self, resource_type: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut url = self.url(resource_type)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        let builder = self.http.get(url).header(ACCEPT, FHIR_JSON);
        self.send_json(builder).await
    }

    /// Server capability statement (`GET metadata`).
    pub async fn capabilities(&self) -> Result<Value> {
        let builder = self.request(Method::GET, "metadata")?;
        self.send_json(builder).await
    }

    pub async fn create(&self, resource: &Value) -> Result<Value> {
        let resource_type = resource_type(resource)?;
        let builder = self
            .request(Method::POST, resource_type)?
            .header(CONTENT_TYPE, FHIR_JSON)
            .body(serde_json::to_vec(resource)?);
        self.send_json(builder).await
    }

    pub async fn update(&self, resource: &Value) -> Result<Value> {
        let resource_type = resource_type(resource)?;
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidRequest("resource has no id".into()))?;

        let builder = self
            .request(Method::PUT, &format!("{}/{}", resource_type, id))?
            .header(CONTENT_TYPE, FHIR_JSON)
            .body(serde_json::to_vec(resource)?);
        self.send_json(builder).await
    }

    pub async fn delete(&self, resource_type: &str, id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("{}/{}", resource_type, id))?;
        self.send(builder).await?;
        Ok(())
    }
}

fn resource_type(resource: &Value) -> Result<&str> {
    resource
        .get("resourceType")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::InvalidRequest("resource has no resourceType".into()))
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
