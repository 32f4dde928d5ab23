//! GCP API interaction module
//!
//! Collaborators of the discovery client: the metadata server, service
//! account authentication, Compute Engine instance listing and GCP error
//! classification.
//!
//! # Module Structure
//!
//! - [`auth`] - Access tokens from a service account key
//! - [`compute`] - Compute Engine `instances.list` and member addresses
//! - [`detect`] - Detection of a GCE environment
//! - [`error`] - GCP JSON error envelope parsing
//! - [`http`] - HTTP utilities for REST API calls
//! - [`metadata`] - Instance metadata server
//!
//! # Example
//!
//! ```ignore
//! use gcp_discovery::gcp::http::GcpHttpClient;
//! use gcp_discovery::gcp::metadata::{GcpMetadataApi, MetadataApi};
//!
//! async fn example() -> gcp_discovery::Result<()> {
//!     let metadata = GcpMetadataApi::new(GcpHttpClient::new()?);
//!     let zone = metadata.current_zone().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod compute;
pub mod detect;
pub mod error;
pub mod http;
pub mod metadata;
