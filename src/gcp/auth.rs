//! GCP Authentication
//!
//! Exchanges a service account key for an OAuth access token. Used when the
//! metadata server cannot issue tokens, e.g. when running outside GCP.

use crate::error::{DiscoveryError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::path::{Path, PathBuf};

/// Scopes requested for discovery: listing instances only needs read access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/compute.readonly"];

/// Source of access tokens for a private key credential
pub trait Authenticator: Send + Sync {
    fn refresh_access_token<'a>(&'a self, private_key_path: &'a Path) -> BoxFuture<'a, Result<String>>;
}

/// Authenticator backed by `gcp_auth` service account credentials
#[derive(Debug, Clone, Default)]
pub struct ServiceAccountAuthenticator;

impl ServiceAccountAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

/// Fail with [`DiscoveryError::PrivateKeyNotFound`] unless `path` is a file
pub fn ensure_key_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(DiscoveryError::PrivateKeyNotFound(path.to_path_buf()))
    }
}

impl Authenticator for ServiceAccountAuthenticator {
    fn refresh_access_token<'a>(&'a self, private_key_path: &'a Path) -> BoxFuture<'a, Result<String>> {
        async move {
            let path = ensure_key_file(private_key_path)?;

            let account = CustomServiceAccount::from_file(&path).map_err(|e| {
                DiscoveryError::Config(format!(
                    "Invalid service account key file {}: {}",
                    path.display(),
                    e
                ))
            })?;

            let token = account
                .token(DEFAULT_SCOPES)
                .await
                .map_err(|e| DiscoveryError::Auth(format!("Failed to get access token: {}", e)))?;

            tracing::debug!("Access token obtained from service account key {}", path.display());
            Ok(token.as_str().to_string())
        }
        .boxed()
    }
}
