//! Compute Engine instance listing
//!
//! Lists the instances of one project/zone, optionally filtered by label,
//! and turns them into member addresses.

use super::http::GcpHttpClient;
use crate::config::Label;
use crate::error::{DiscoveryError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;

/// Public Compute Engine API endpoint
pub const COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com";

/// Network endpoint of a discovered instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    private_address: String,
    public_address: Option<String>,
    port: u16,
    name: Option<String>,
}

impl Address {
    pub fn new(
        private_address: impl Into<String>,
        public_address: Option<String>,
        port: u16,
        name: Option<String>,
    ) -> Self {
        Self {
            private_address: private_address.into(),
            public_address,
            port,
            name,
        }
    }

    pub fn private_address(&self) -> &str {
        &self.private_address
    }

    pub fn public_address(&self) -> Option<&str> {
        self.public_address.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Instance name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.private_address, self.port)?;
        if let Some(public) = &self.public_address {
            write!(f, " (public {})", public)?;
        }
        if let Some(name) = &self.name {
            write!(f, " [{}]", name)?;
        }
        Ok(())
    }
}

/// Capability to list candidate member addresses
pub trait ComputeApi: Send + Sync {
    fn instances<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        label: Option<&'a Label>,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Address>>>;
}

/// `instances.list` filter expression for a label
pub fn label_filter(label: &Label) -> String {
    format!("labels.{} eq \"{}\"", label.key, label.value)
}

/// Map one `instances.list` item to an address.
///
/// Instances without a private IP (e.g. not yet provisioned) yield `None`.
pub fn address_from_instance(instance: &Value, port: u16) -> Option<Address> {
    let interface = instance
        .get("networkInterfaces")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())?;

    let private_address = interface.get("networkIP").and_then(|v| v.as_str())?;

    let public_address = interface
        .get("accessConfigs")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|config| config.get("natIP"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let name = instance
        .get("name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Some(Address::new(private_address, public_address, port, name))
}

/// Compute Engine client backed by HTTP
#[derive(Clone)]
pub struct GcpComputeApi {
    http: GcpHttpClient,
    endpoint: String,
    port: u16,
}

impl GcpComputeApi {
    /// Create a client that tags every address with the member `port`
    pub fn new(http: GcpHttpClient, port: u16) -> Self {
        Self::with_endpoint(http, COMPUTE_ENDPOINT, port)
    }

    /// Point at a different Compute endpoint (emulators, tests)
    pub fn with_endpoint(http: GcpHttpClient, endpoint: &str, port: u16) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            port,
        }
    }

    /// Build zonal instances URL
    pub fn instances_url(&self, project: &str, zone: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/zones/{}/instances",
            self.endpoint,
            urlencoding::encode(project),
            urlencoding::encode(zone)
        )
    }

    async fn list_instances(
        &self,
        project: &str,
        zone: &str,
        label: Option<&Label>,
        access_token: &str,
    ) -> Result<Vec<Address>> {
        let url = self.instances_url(project, zone);
        let filter = label.map(label_filter);
        let mut addresses = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(filter) = filter.as_deref() {
                query.push(("filter", filter));
            }
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .http
                .get_json(&url, access_token, &query)
                .await
                .map_err(DiscoveryError::Transport)?;

            if let Some(items) = response.get("items").and_then(|v| v.as_array()) {
                for item in items {
                    match address_from_instance(item, self.port) {
                        Some(address) => addresses.push(address),
                        None => tracing::debug!(
                            "Skipping instance without private address: {}",
                            item.get("name").and_then(|v| v.as_str()).unwrap_or("-")
                        ),
                    }
                }
            }

            page_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            if page_token.is_none() {
                break;
            }
        }

        Ok(addresses)
    }
}

impl ComputeApi for GcpComputeApi {
    fn instances<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        label: Option<&'a Label>,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Address>>> {
        self.list_instances(project, zone, label, access_token).boxed()
    }
}
