//! Peer discovery for clusters running on Google Cloud Platform.
//!
//! A [`DiscoveryClient`] finds the addresses of the Compute Engine instances
//! that belong to a cluster. Projects and zones come from the
//! [`DiscoveryConfig`] or, when left empty, from the instance metadata server.
//! Instances can be narrowed down with a label.
//!
//! ```ignore
//! use gcp_discovery::{DiscoveryClient, DiscoveryConfig, Label};
//!
//! async fn members() -> gcp_discovery::Result<()> {
//!     let config = DiscoveryConfig::builder()
//!         .label(Label::new("cluster", "prod"))
//!         .build()?;
//!     let client = DiscoveryClient::from_config(config).await?;
//!     for address in client.get_addresses().await? {
//!         println!("{}", address);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod gcp;
pub mod retry;

pub use config::{DiscoveryConfig, Label};
pub use discovery::{DiscoveryClient, ResolvedIdentity};
pub use error::{DiscoveryError, RestError, Result};
pub use gcp::compute::Address;
pub use gcp::error::GcpApiError;
pub use retry::RetryPolicy;
