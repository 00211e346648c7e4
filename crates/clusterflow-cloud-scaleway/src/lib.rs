//! Scaleway binding for ClusterFlow
//!
//! [`ScalewayClient`] implements every capability trait of
//! `clusterflow-cloud` over the Scaleway HTTP API:
//!
//! - Instance API: servers, volumes, private NICs, user data
//! - VPC: private networks
//! - VPC public gateways and their gateway networks
//! - Load balancers
//! - Domains and DNS records
//!
//! # Example
//!
//! ```ignore
//! use clusterflow_cloud::CloudApis;
//! use clusterflow_cloud_scaleway::ScalewayClient;
//! use clusterflow_config::{ConfigOverrides, ScalewayConfig};
//! use std::sync::Arc;
//!
//! let config = ScalewayConfig::load(&ConfigOverrides::default())?;
//! let apis = CloudApis::from_client(Arc::new(ScalewayClient::new(config)?));
//! ```

pub mod client;
pub mod domain;
pub mod error;
pub mod instance;
pub mod lb;
pub mod vpc;

pub use client::ScalewayClient;
pub use error::{Result, ScalewayError};
