//! Cloud object model
//!
//! Field names follow the Scaleway API JSON so the binding can deserialize
//! responses straight into these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Power state of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerState {
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "stopped in place")]
    StoppedInPlace,
    #[serde(rename = "starting")]
    Starting,
    #[serde(rename = "stopping")]
    Stopping,
    #[serde(rename = "locked")]
    Locked,
}

impl ServerState {
    /// States the server leaves on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, ServerState::Starting | ServerState::Stopping)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Running => write!(f, "running"),
            ServerState::Stopped => write!(f, "stopped"),
            ServerState::StoppedInPlace => write!(f, "stopped in place"),
            ServerState::Starting => write!(f, "starting"),
            ServerState::Stopping => write!(f, "stopping"),
            ServerState::Locked => write!(f, "locked"),
        }
    }
}

/// Power action issued to a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAction {
    Poweron,
    Poweroff,
    StopInPlace,
    Reboot,
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAction::Poweron => write!(f, "poweron"),
            ServerAction::Poweroff => write!(f, "poweroff"),
            ServerAction::StopInPlace => write!(f, "stop_in_place"),
            ServerAction::Reboot => write!(f, "reboot"),
        }
    }
}

/// State of a block volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    Available,
    Snapshotting,
    Fetching,
    Resizing,
    Saving,
    Hotsyncing,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerImage {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerVolume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub state: VolumeState,
    /// Not part of the server payload; filled from the volume itself by
    /// `InstanceHandler` lookups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateNic {
    pub id: String,
    pub private_network_id: String,
    #[serde(default)]
    pub server_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerIp {
    pub address: String,
}

/// Compute instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub commercial_type: String,
    #[serde(default)]
    pub image: Option<ServerImage>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub state: ServerState,
    /// Attached volumes keyed by slot ("0" is the root volume)
    #[serde(default)]
    pub volumes: BTreeMap<String, ServerVolume>,
    #[serde(default)]
    pub private_nics: Vec<PrivateNic>,
    #[serde(default)]
    pub public_ip: Option<ServerIp>,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
}

impl Server {
    pub fn root_volume(&self) -> Option<&ServerVolume> {
        self.volumes.get("0")
    }

    pub fn is_attached_to(&self, private_network_id: &str) -> bool {
        self.private_nics
            .iter()
            .any(|nic| nic.private_network_id == private_network_id)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.public_ip
            .iter()
            .map(|ip| ip.address.clone())
            .chain(self.private_ip.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeServer {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Block volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub zone: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub volume_type: String,
    pub state: VolumeState,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub server: Option<VolumeServer>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
}

/// Private network (VPC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateNetwork {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subnets: Vec<String>,
}

/// Link between a public gateway and a private network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayNetwork {
    pub id: String,
    pub gateway_id: String,
    pub private_network_id: String,
}

/// Public gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbIp {
    #[serde(default)]
    pub id: String,
    pub ip_address: String,
}

/// Load balancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type", default)]
    pub lb_type: String,
    #[serde(default)]
    pub ip: Vec<LbIp>,
}

impl LoadBalancer {
    pub fn addresses(&self) -> Vec<String> {
        self.ip.iter().map(|ip| ip.ip_address.clone()).collect()
    }
}

/// DNS record inside a zone; `name` is relative to the zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub data: String,
    #[serde(default)]
    pub ttl: u32,
}

/// Name/tag filter for list calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub name: Option<String>,
    pub tags: Vec<String>,
}

impl ListFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            tags: Vec::new(),
        }
    }

    pub fn by_tag(tag: impl Into<String>) -> Self {
        Self {
            name: None,
            tags: vec![tag.into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub commercial_type: String,
    pub image: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub size: u64,
    pub volume_type: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePrivateNetworkRequest {
    pub name: String,
    pub tags: Vec<String>,
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateLoadBalancerRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub lb_type: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDnsRecordRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub data: String,
    pub ttl: u32,
}
