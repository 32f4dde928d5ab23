//! GCP Metadata Server
//!
//! Reads the current project, zone and a service-account access token from
//! the instance metadata endpoint.

use super::http::GcpHttpClient;
use crate::error::{DiscoveryError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;

/// Metadata endpoint reachable from every GCE instance
pub const METADATA_ENDPOINT: &str = "http://metadata.google.internal";

const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");

/// Identity and credentials of the instance this process runs on
pub trait MetadataApi: Send + Sync {
    fn current_project(&self) -> BoxFuture<'_, Result<String>>;
    fn current_zone(&self) -> BoxFuture<'_, Result<String>>;
    fn access_token(&self) -> BoxFuture<'_, Result<String>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Metadata client backed by HTTP
#[derive(Clone)]
pub struct GcpMetadataApi {
    http: GcpHttpClient,
    endpoint: String,
}

impl GcpMetadataApi {
    pub fn new(http: GcpHttpClient) -> Self {
        Self::with_endpoint(http, METADATA_ENDPOINT)
    }

    /// Point at a different metadata server (emulators, tests)
    pub fn with_endpoint(http: GcpHttpClient, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn call_get(&self, path: &str) -> Result<String> {
        let url = format!("{}/computeMetadata/v1/{}", self.endpoint, path);
        Ok(self.http.get_text(&url, &[METADATA_FLAVOR]).await?)
    }
}

/// Last `/`-separated segment, e.g. the zone of `projects/123/zones/us-east1-b`
pub fn last_segment(path: &str) -> &str {
    path.trim().rsplit('/').next().unwrap_or_default()
}

/// Extract `access_token` from a metadata token response
pub fn extract_access_token(body: &str) -> Result<String> {
    match serde_json::from_str::<TokenResponse>(body) {
        Ok(response) => Ok(response.access_token),
        Err(e) => {
            tracing::warn!(
                "Unable to retrieve access token. Please grant permissions to this service account \
                 if running from within the GCP network, or specify the private key file path if \
                 running from outside GCP."
            );
            Err(DiscoveryError::Parse(format!(
                "Invalid access token response from metadata server: {}",
                e
            )))
        }
    }
}

impl MetadataApi for GcpMetadataApi {
    fn current_project(&self) -> BoxFuture<'_, Result<String>> {
        async move { self.call_get("project/project-id").await }.boxed()
    }

    fn current_zone(&self) -> BoxFuture<'_, Result<String>> {
        async move {
            let response = self.call_get("instance/zone").await?;
            Ok(last_segment(&response).to_string())
        }
        .boxed()
    }

    fn access_token(&self) -> BoxFuture<'_, Result<String>> {
        async move {
            let response = self
                .call_get("instance/service-accounts/default/token")
                .await?;
            extract_access_token(&response)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("projects/123/zones/us-east1-b"), "us-east1-b");
        assert_eq!(last_segment("us-east1-b"), "us-east1-b");
        assert_eq!(last_segment("projects/123/zones/europe-west1-c\n"), "europe-west1-c");
    }

    #[test]
    fn test_extract_access_token() {
        let token = extract_access_token(r#"{"access_token":"abc","expires_in":3599,"token_type":"Bearer"}"#);
        assert_eq!(token.unwrap(), "abc");
    }

    #[test]
    fn test_extract_access_token_malformed() {
        let err = extract_access_token("<!DOCTYPE html><html></html>").unwrap_err();
        assert!(matches!(err, DiscoveryError::Parse(_)));
        assert!(!err.is_retryable());
    }
}
