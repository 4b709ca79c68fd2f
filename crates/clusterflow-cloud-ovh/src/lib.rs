//! OVHcloud provider for ClusterFlow
//!
//! This crate implements the ResourceAdapter trait for users of OVHcloud
//! Public Cloud Databases clusters.
//!
//! # Features
//!
//! - OpenSearch user management (create, read, update ACLs, delete, import)
//! - User status polling shared by every database engine
//!
//! # Requirements
//!
//! - An OAuth2 access token and an endpoint (`ovh-eu`, `ovh-ca`, `ovh-us`
//!   or a URL), usually loaded through `clusterflow-config`
//!
//! # Example
//!
//! ```ignore
//! use clusterflow_cloud_ovh::{ClientConfig, OpenSearchUserConfig, OpenSearchUserResource, OvhClient};
//! use clusterflow_cloud_ovh::models::Acl;
//! use std::time::Duration;
//!
//! let client = OvhClient::new(ClientConfig::new("ovh-eu", token))?;
//! let users = OpenSearchUserResource::new(client);
//!
//! let config = OpenSearchUserConfig {
//!     service_name: Some("0123456789abcdef".to_string()),
//!     cluster_id: "7d0b6a2e-...".to_string(),
//!     name: "ingest".to_string(),
//!     acls: [Acl::new("logs-*", "write")].into_iter().collect(),
//! };
//! let user = users.create_user(&config, Duration::from_secs(1200)).await?;
//! println!("{} is {:?}", user.import_id(), user.status);
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod opensearch_user;
pub mod paths;
pub mod waiter;

pub use client::{ClientConfig, OVH_API_BASE, OvhClient, resolve_endpoint};
pub use error::{OvhError, Result};
pub use opensearch_user::{
    OpenSearchUser, OpenSearchUserConfig, OpenSearchUserResource, RESOURCE_TYPE, parse_import_id,
};
pub use waiter::{UserStatusSource, wait_for_user_deleted, wait_for_user_ready};
