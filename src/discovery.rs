//! Discovery Client
//!
//! Resolves which projects and zones to search, obtains an access token and
//! lists the member instances of every (project, zone) pair.

use crate::config::{DiscoveryConfig, Label};
use crate::error::{DiscoveryError, Result};
use crate::gcp::auth::{Authenticator, ServiceAccountAuthenticator};
use crate::gcp::compute::{Address, ComputeApi, GcpComputeApi};
use crate::gcp::error::{is_gcp_structured_error, GcpApiError};
use crate::gcp::http::GcpHttpClient;
use crate::gcp::metadata::{GcpMetadataApi, MetadataApi};
use crate::retry::{retry, RetryPolicy};
use std::path::PathBuf;
use std::sync::Arc;

/// Failures containing one of these phrases are permanent misconfiguration
pub const NON_RETRYABLE_KEYWORDS: &[&str] = &[
    "Private key json file not found",
    "Your service account does not have permissions",
    "Project could not be retrieved",
    "Zone could not be retrieved",
];

/// Projects and zones searched by a client, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub projects: Vec<String>,
    pub zones: Vec<String>,
}

/// Reject a project id that is really an HTML page from a non-GCP endpoint
pub fn validate_retrieved_project(project: String) -> Result<String> {
    let project = project.trim().to_string();
    if project.starts_with("<!DOCTYPE html") || project.is_empty() {
        tracing::error!(
            "Project name could not be retrieved. Please specify the 'projects' property \
             if running from outside GCP network"
        );
        return Err(DiscoveryError::MetadataUnavailable(
            "Project could not be retrieved from GCP config".into(),
        ));
    }
    Ok(project)
}

/// Reject a zone that is the tail of an HTML page from a non-GCP endpoint
pub fn validate_retrieved_zone(zone: String) -> Result<String> {
    if zone == "html>" || zone.is_empty() {
        tracing::error!(
            "Zone could not be retrieved. Please specify the 'zones' property \
             if running from outside GCP network"
        );
        return Err(DiscoveryError::MetadataUnavailable(
            "Zone could not be retrieved from GCP config".into(),
        ));
    }
    Ok(zone)
}

/// Turn a transport failure carrying a GCP error body into a [`GcpApiError`]
fn classify_failure(err: DiscoveryError) -> DiscoveryError {
    match err {
        DiscoveryError::Transport(rest) if is_gcp_structured_error(&rest.body) => {
            match GcpApiError::parse(&rest.body) {
                Some(api_error) => DiscoveryError::Gcp(api_error.with_url(rest.url)),
                None => DiscoveryError::Transport(rest),
            }
        }
        other => other,
    }
}

/// Client discovering cluster members on GCP
pub struct DiscoveryClient {
    metadata: Arc<dyn MetadataApi>,
    compute: Arc<dyn ComputeApi>,
    authenticator: Arc<dyn Authenticator>,
    identity: ResolvedIdentity,
    label: Option<Label>,
    private_key_path: Option<PathBuf>,
    retry_policy: RetryPolicy,
}

impl DiscoveryClient {
    /// Create a client talking to the real metadata server and Compute API
    pub async fn from_config(config: DiscoveryConfig) -> Result<Self> {
        let http = GcpHttpClient::with_timeout(config.request_timeout())?;
        let metadata = Arc::new(GcpMetadataApi::new(http.clone()));
        let compute = Arc::new(GcpComputeApi::new(http, config.port));
        let authenticator = Arc::new(ServiceAccountAuthenticator::new());
        Self::new(metadata, compute, authenticator, config).await
    }

    /// Create a client, resolving projects and zones right away
    pub async fn new(
        metadata: Arc<dyn MetadataApi>,
        compute: Arc<dyn ComputeApi>,
        authenticator: Arc<dyn Authenticator>,
        config: DiscoveryConfig,
    ) -> Result<Self> {
        let policy = RetryPolicy::with_max_attempts(config.retries);
        Self::with_retry_policy(metadata, compute, authenticator, config, policy).await
    }

    /// Like [`DiscoveryClient::new`] with an explicit backoff schedule
    pub async fn with_retry_policy(
        metadata: Arc<dyn MetadataApi>,
        compute: Arc<dyn ComputeApi>,
        authenticator: Arc<dyn Authenticator>,
        config: DiscoveryConfig,
        retry_policy: RetryPolicy,
    ) -> Result<Self> {
        let projects = resolve_projects(&*metadata, &config, &retry_policy).await?;
        let zones = resolve_zones(&*metadata, &config, &retry_policy).await?;
        tracing::info!("Discovering members in projects {:?}, zones {:?}", projects, zones);

        Ok(Self {
            metadata,
            compute,
            authenticator,
            identity: ResolvedIdentity { projects, zones },
            label: config.label,
            private_key_path: config.private_key_path,
            retry_policy,
        })
    }

    pub fn identity(&self) -> &ResolvedIdentity {
        &self.identity
    }

    /// Addresses of all matching instances, projects outer and zones inner
    pub async fn get_addresses(&self) -> Result<Vec<Address>> {
        let result = retry(
            || self.fetch_addresses(),
            &self.retry_policy,
            NON_RETRYABLE_KEYWORDS,
        )
        .await;

        if let Err(DiscoveryError::Gcp(api_error)) = &result {
            tracing::error!("{}", api_error.diagnostic());
        }
        result
    }

    /// Zone of the local instance, read from the metadata server on every call
    pub async fn get_availability_zone(&self) -> Result<String> {
        self.metadata.current_zone().await
    }

    async fn fetch_addresses(&self) -> Result<Vec<Address>> {
        tracing::debug!("Fetching OAuth access token");
        let access_token = self.fetch_access_token().await?;

        let mut result = Vec::new();
        for project in &self.identity.projects {
            for zone in &self.identity.zones {
                tracing::debug!("Fetching instances for project '{}' and zone '{}'", project, zone);
                let addresses = self
                    .compute
                    .instances(project, zone, self.label.as_ref(), &access_token)
                    .await
                    .map_err(classify_failure)?;
                tracing::debug!(
                    "Found {} instances for project '{}' and zone '{}': {:?}",
                    addresses.len(),
                    project,
                    zone,
                    addresses
                );
                result.extend(addresses);
            }
        }

        tracing::info!("Discovered {} member addresses", result.len());
        Ok(result)
    }

    async fn fetch_access_token(&self) -> Result<String> {
        match &self.private_key_path {
            Some(path) => self.authenticator.refresh_access_token(path).await,
            None => self.metadata.access_token().await,
        }
    }
}

async fn resolve_projects(
    metadata: &dyn MetadataApi,
    config: &DiscoveryConfig,
    policy: &RetryPolicy,
) -> Result<Vec<String>> {
    if !config.projects.is_empty() {
        return Ok(config.projects.clone());
    }
    tracing::debug!("Property 'projects' not configured, fetching the current GCP project");

    let project = retry(
        move || async move { validate_retrieved_project(metadata.current_project().await?) },
        policy,
        NON_RETRYABLE_KEYWORDS,
    )
    .await
    .map_err(|e| {
        DiscoveryError::Config(format!(
            "Current GCP project could not be resolved ({}). \
             Please set the 'projects' property explicitly",
            e
        ))
    })?;

    Ok(vec![project])
}

async fn resolve_zones(
    metadata: &dyn MetadataApi,
    config: &DiscoveryConfig,
    policy: &RetryPolicy,
) -> Result<Vec<String>> {
    if !config.zones.is_empty() {
        return Ok(config.zones.clone());
    }
    tracing::debug!("Property 'zones' not configured, fetching the current GCP zone");

    let zone = retry(
        move || async move { validate_retrieved_zone(metadata.current_zone().await?) },
        policy,
        NON_RETRYABLE_KEYWORDS,
    )
    .await
    .map_err(|e| {
        DiscoveryError::Config(format!(
            "Current GCP zone could not be resolved ({}). \
             Please set the 'zones' property explicitly",
            e
        ))
    })?;

    Ok(vec![zone])
}
