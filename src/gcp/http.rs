//! HTTP utilities for GCP REST API calls

use crate::error::RestError;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Overall (connect + read) timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for REST GET calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client with the default request timeout
    pub fn new() -> Result<Self, RestError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, RestError> {
        let client = Client::builder()
            .user_agent(concat!("gcp-discovery/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::connection("", format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET `url` with extra headers and return the body as text
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, RestError> {
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RestError::connection(url, format!("Failed to send request to {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RestError::connection(url, format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(RestError::status(url, status.as_u16(), body));
        }

        Ok(body)
    }

    /// GET `url` with a bearer token and query parameters, parsing the body as JSON
    pub async fn get_json(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, RestError> {
        tracing::debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| RestError::connection(url, format!("Failed to send request to {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RestError::connection(url, format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(RestError::status(url, status.as_u16(), body));
        }

        serde_json::from_str(&body).map_err(|e| RestError {
            url: url.to_string(),
            status: Some(status.as_u16()),
            message: format!("Failed to parse response JSON from {}: {}", url, e),
            body,
        })
    }
}
