//! Error types
//!
//! Every failure the discovery client can hit is a [`DiscoveryError`]. The
//! variants follow the retry taxonomy: configuration and classified GCP
//! errors are fatal, transport and token-exchange errors are transient.

use crate::gcp::error::GcpApiError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Failure of a REST call at the transport layer.
///
/// Covers connection failures as well as non-2xx responses. The body is kept
/// so the caller can check whether it holds a structured GCP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestError {
    pub url: String,
    pub status: Option<u16>,
    pub body: String,
    pub message: String,
}

impl RestError {
    /// Error for a response that came back with a non-success status.
    pub fn status(url: &str, status: u16, body: String) -> Self {
        Self {
            url: url.to_string(),
            status: Some(status),
            message: format!("HTTP {} returned by {}", status, url),
            body,
        }
    }

    /// Error for a request that never produced a response.
    pub fn connection(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status: None,
            body: String::new(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RestError {}

/// Discovery errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Configuration that cannot be used, or identity that cannot be resolved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configured service account key does not exist.
    #[error("Private key json file not found: {}", .0.display())]
    PrivateKeyNotFound(PathBuf),

    /// A structured error returned by a GCP API.
    #[error(transparent)]
    Gcp(#[from] GcpApiError),

    /// Transport failure without a recognizable GCP error body.
    #[error("REST call failed: {0}")]
    Transport(RestError),

    /// OAuth token exchange failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Malformed response from the metadata server.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The metadata server answered with something that is not GCP metadata.
    #[error("{0}")]
    MetadataUnavailable(String),
}

impl DiscoveryError {
    /// Whether retrying the failed operation can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Auth(_))
    }
}

impl From<RestError> for DiscoveryError {
    fn from(err: RestError) -> Self {
        Self::Transport(err)
    }
}
