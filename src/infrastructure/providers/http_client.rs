//! # HTTP Client Utilities
//!
//! Shared HTTP client for JSON provider APIs.
//!
//! Wraps a `reqwest::Client` with a fixed base URL, optional bearer token
//! and the status-code to [`ProviderError`] mapping every REST adapter uses.
//!
//! # Examples
//!
//! ```ignore
//! use flight_aggregator::infrastructure::providers::http_client::HttpClient;
//!
//! let client = HttpClient::new("https://api.example.com", 5000)?.with_bearer("token");
//! let body: MyResponse = client.get_json("/airports", &[("q", "lon")]).await?;
//! ```

use crate::infrastructure::providers::error::{AdapterResult, ProviderError};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client bound to one provider endpoint.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    bearer: Option<String>,
    timeout_ms: u64,
}

impl HttpClient {
    /// Creates a client for `base_url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if the client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> AdapterResult<Self> {
        Self::with_headers(base_url, timeout_ms, HeaderMap::new())
    }

    /// Creates a client sending `default_headers` on every request.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if the client cannot be built.
    pub fn with_headers(
        base_url: impl Into<String>,
        timeout_ms: u64,
        default_headers: HeaderMap,
    ) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ProviderError::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer: None,
            timeout_ms,
        })
    }

    /// Authenticates every request with a bearer token.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Returns the configured timeout in milliseconds.
    #[inline]
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Returns the base URL without trailing slash.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> AdapterResult<RequestBuilder> {
        match &self.bearer {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ProviderError::configuration("api key is not a valid header value"))?;
                Ok(request.header(AUTHORIZATION, value))
            }
            None => Ok(request),
        }
    }

    /// GET `path` with query parameters and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns a transport, status or decoding `ProviderError`.
    pub async fn get_json<T, Q>(&self, path: &str, query: &Q) -> AdapterResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.authorized(self.client.get(self.url(path)).query(query))?;
        let response = request.send().await.map_err(|e| self.map_reqwest_error(&e))?;
        self.handle_response(response).await
    }

    /// POST a JSON body to `path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns a transport, status or decoding `ProviderError`.
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> AdapterResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.authorized(self.client.post(self.url(path)).json(body))?;
        let response = request.send().await.map_err(|e| self.map_reqwest_error(&e))?;
        self.handle_response(response).await
    }

    /// GET `path` and require a 2xx status, ignoring the body.
    ///
    /// # Errors
    ///
    /// Returns a transport or status `ProviderError`.
    pub async fn probe(&self, path: &str) -> AdapterResult<()> {
        let request = self.authorized(self.client.get(self.url(path)))?;
        let response = request.send().await.map_err(|e| self.map_reqwest_error(&e))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::map_status_error(status, None, ""))
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> AdapterResult<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| ProviderError::protocol(format!("failed to parse response: {e}")))
        } else {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));
            let error_body = response.text().await.unwrap_or_default();
            Err(Self::map_status_error(status, retry_after, &error_body))
        }
    }

    fn map_reqwest_error(&self, error: &reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::timeout_with_duration("request timed out", self.timeout_ms)
        } else if error.is_connect() {
            ProviderError::connection(format!("connection failed: {error}"))
        } else if error.is_decode() {
            ProviderError::protocol(format!("failed to decode response: {error}"))
        } else {
            ProviderError::connection(format!("HTTP request failed: {error}"))
        }
    }

    fn map_status_error(status: StatusCode, retry_after_ms: Option<u64>, body: &str) -> ProviderError {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ProviderError::invalid_request(format!("bad request: {body}"))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::authentication(format!("authentication failed: {body}"))
            }
            StatusCode::NOT_FOUND => ProviderError::protocol(format!("resource not found: {body}")),
            StatusCode::TOO_MANY_REQUESTS => match retry_after_ms {
                Some(ms) => ProviderError::rate_limited_with_retry("rate limit exceeded", ms),
                None => ProviderError::rate_limited("rate limit exceeded"),
            },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ProviderError::timeout(format!("upstream timeout ({status})"))
            }
            s if s.is_server_error() => {
                ProviderError::upstream(format!("server error ({s}): {body}"), Some(s.as_u16()))
            }
            s => ProviderError::upstream(format!("HTTP error ({s}): {body}"), Some(s.as_u16())),
        }
    }
}
