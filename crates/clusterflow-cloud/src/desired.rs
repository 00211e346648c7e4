//! Desired-state documents
//!
//! A model builder outside this crate turns a cluster definition into a
//! [`DesiredSet`]. The engine only reads it.

use crate::diff::{Field, ResourceSpec};
use crate::error::{CloudError, Result};
use crate::model::ServerState;
use crate::resource::{ResourceHandle, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;

/// An instance group: `count` servers sharing one name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub commercial_type: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    /// `cloud-init` user data uploaded after creation
    #[serde(default)]
    pub user_data: Option<String>,
    /// Name of the private network every server is attached to
    #[serde(default)]
    pub private_network: Option<String>,
    /// Servers not yet attached or powered on
    #[serde(skip)]
    pub unprovisioned: usize,
}

fn default_count() -> usize {
    1
}

impl InstanceSpec {
    /// Whether a server still needs tags, a NIC or a power-on to match this group.
    ///
    /// Root-volume tags count too, as read back by `InstanceHandler`.
    pub fn needs_provisioning(&self, handle: &ResourceHandle) -> bool {
        let Some(server) = handle.as_server() else {
            return false;
        };
        let root_tags = server.root_volume().map(|v| v.tags.as_slice()).unwrap_or(&[]);
        server.state != ServerState::Running
            || (self.private_network.is_some() && server.private_nics.is_empty())
            || (!self.tags.is_empty() && sorted(&server.tags) != sorted(&self.tags))
            || (!self.tags.is_empty() && sorted(root_tags) != sorted(&self.tags))
    }
}

impl ResourceSpec for InstanceSpec {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Instance
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn zone(&self) -> Option<&str> {
        Some(self.zone.as_str()).filter(|z| !z.is_empty())
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::immutable("name", json!(self.name)),
            Field::immutable("zone", json!(self.zone)),
            Field::immutable("commercial_type", json!(self.commercial_type)),
            Field::immutable("image", json!(self.image)),
            Field::mutable("tags", json!(sorted(&self.tags))),
            Field::mutable("count", json!(self.count)),
            Field::mutable("unprovisioned", json!(self.unprovisioned)),
            Field::computed("user_data", json!(self.user_data)),
            Field::computed("private_network", json!(self.private_network)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    #[serde(default)]
    pub zone: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ResourceSpec for VolumeSpec {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Volume
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn zone(&self) -> Option<&str> {
        Some(self.zone.as_str()).filter(|z| !z.is_empty())
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::immutable("name", json!(self.name)),
            Field::immutable("zone", json!(self.zone)),
            Field::immutable("size", if self.size == 0 { json!(null) } else { json!(self.size) }),
            Field::immutable("volume_type", json!(self.volume_type)).optional(),
            Field::mutable("tags", json!(sorted(&self.tags))),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateNetworkSpec {
    pub name: String,
    #[serde(default)]
    pub zone: String,
    /// IPv4 subnet in CIDR notation
    #[serde(default)]
    pub ip_range: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ResourceSpec for PrivateNetworkSpec {
    fn resource_type(&self) -> ResourceType {
        ResourceType::PrivateNetwork
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn zone(&self) -> Option<&str> {
        Some(self.zone.as_str()).filter(|z| !z.is_empty())
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::immutable("name", json!(self.name)),
            Field::immutable("zone", json!(self.zone)),
            Field::immutable("ip_range", json!(self.ip_range)).optional(),
            Field::mutable("tags", json!(sorted(&self.tags))),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    #[serde(default)]
    pub lb_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Assigned by the cloud
    #[serde(default, skip_deserializing)]
    pub addresses: Vec<String>,
}

impl ResourceSpec for LoadBalancerSpec {
    fn resource_type(&self) -> ResourceType {
        ResourceType::LoadBalancer
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::immutable("name", json!(self.name)),
            Field::immutable("lb_type", json!(self.lb_type)),
            Field::mutable("tags", json!(sorted(&self.tags))),
            Field::computed("addresses", json!(self.addresses)),
        ]
    }
}

/// A record relative to the DNS zone (`api.demo` in zone `example.com`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecordSpec {
    pub name: String,
    #[serde(default = "default_record_type")]
    pub record_type: String,
    #[serde(default)]
    pub data: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_record_type() -> String {
    "A".to_string()
}

fn default_ttl() -> u32 {
    60
}

impl ResourceSpec for DnsRecordSpec {
    fn resource_type(&self) -> ResourceType {
        ResourceType::DnsRecord
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::immutable("name", json!(self.name)),
            Field::immutable("record_type", json!(self.record_type)),
            Field::mutable("data", json!(self.data)),
            Field::mutable("ttl", json!(self.ttl)),
        ]
    }
}

fn sorted(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.sort();
    tags
}

/// Actual-state value read back from a live handle
pub trait ObservedSpec: ResourceSpec + Clone + Send + Sync + Sized {
    fn from_handle(handle: &ResourceHandle) -> Option<Self>;

    fn to_desired(&self) -> DesiredResource;

    /// Whether this observed value is the resource `desired` describes,
    /// beyond sharing its name
    fn same_key(&self, desired: &Self) -> bool {
        let _ = desired;
        true
    }
}

impl ObservedSpec for VolumeSpec {
    fn from_handle(handle: &ResourceHandle) -> Option<Self> {
        handle.as_volume().map(|v| VolumeSpec {
            name: v.name.clone(),
            zone: v.zone.clone(),
            size: v.size,
            volume_type: v.volume_type.clone(),
            tags: v.tags.clone(),
        })
    }

    fn to_desired(&self) -> DesiredResource {
        DesiredResource::Volume(self.clone())
    }
}

impl ObservedSpec for PrivateNetworkSpec {
    fn from_handle(handle: &ResourceHandle) -> Option<Self> {
        handle.as_private_network().map(|pn| PrivateNetworkSpec {
            name: pn.name.clone(),
            zone: pn.zone.clone(),
            ip_range: pn.subnets.first().cloned(),
            tags: pn.tags.clone(),
        })
    }

    fn to_desired(&self) -> DesiredResource {
        DesiredResource::PrivateNetwork(self.clone())
    }
}

impl ObservedSpec for LoadBalancerSpec {
    fn from_handle(handle: &ResourceHandle) -> Option<Self> {
        handle.as_load_balancer().map(|lb| LoadBalancerSpec {
            name: lb.name.clone(),
            lb_type: lb.lb_type.clone(),
            tags: lb.tags.clone(),
            addresses: lb.addresses(),
        })
    }

    fn to_desired(&self) -> DesiredResource {
        DesiredResource::LoadBalancer(self.clone())
    }
}

impl ObservedSpec for DnsRecordSpec {
    fn from_handle(handle: &ResourceHandle) -> Option<Self> {
        handle.as_dns_record().map(|r| DnsRecordSpec {
            name: r.name.clone(),
            record_type: r.record_type.clone(),
            data: r.data.clone(),
            ttl: r.ttl,
        })
    }

    fn to_desired(&self) -> DesiredResource {
        DesiredResource::DnsRecord(self.clone())
    }

    /// Records are keyed by name and type
    fn same_key(&self, desired: &Self) -> bool {
        self.record_type.eq_ignore_ascii_case(&desired.record_type)
    }
}

/// One desired resource, tagged by type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DesiredResource {
    Instance(InstanceSpec),
    Volume(VolumeSpec),
    PrivateNetwork(PrivateNetworkSpec),
    LoadBalancer(LoadBalancerSpec),
    DnsRecord(DnsRecordSpec),
}

impl DesiredResource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            DesiredResource::Instance(_) => ResourceType::Instance,
            DesiredResource::Volume(_) => ResourceType::Volume,
            DesiredResource::PrivateNetwork(_) => ResourceType::PrivateNetwork,
            DesiredResource::LoadBalancer(_) => ResourceType::LoadBalancer,
            DesiredResource::DnsRecord(_) => ResourceType::DnsRecord,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DesiredResource::Instance(s) => &s.name,
            DesiredResource::Volume(s) => &s.name,
            DesiredResource::PrivateNetwork(s) => &s.name,
            DesiredResource::LoadBalancer(s) => &s.name,
            DesiredResource::DnsRecord(s) => &s.name,
        }
    }

    /// `type:name`
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type(), self.name())
    }

    fn mismatch(&self, expected: ResourceType) -> CloudError {
        CloudError::InvalidDesiredState(format!(
            "expected a {} but got {}",
            expected,
            self.key()
        ))
    }

    pub fn as_instance(&self) -> Result<&InstanceSpec> {
        match self {
            DesiredResource::Instance(s) => Ok(s),
            _ => Err(self.mismatch(ResourceType::Instance)),
        }
    }

    pub fn as_volume(&self) -> Result<&VolumeSpec> {
        match self {
            DesiredResource::Volume(s) => Ok(s),
            _ => Err(self.mismatch(ResourceType::Volume)),
        }
    }

    pub fn as_private_network(&self) -> Result<&PrivateNetworkSpec> {
        match self {
            DesiredResource::PrivateNetwork(s) => Ok(s),
            _ => Err(self.mismatch(ResourceType::PrivateNetwork)),
        }
    }

    pub fn as_load_balancer(&self) -> Result<&LoadBalancerSpec> {
        match self {
            DesiredResource::LoadBalancer(s) => Ok(s),
            _ => Err(self.mismatch(ResourceType::LoadBalancer)),
        }
    }

    pub fn as_dns_record(&self) -> Result<&DnsRecordSpec> {
        match self {
            DesiredResource::DnsRecord(s) => Ok(s),
            _ => Err(self.mismatch(ResourceType::DnsRecord)),
        }
    }
}

/// Everything a cluster should consist of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredSet {
    /// Cluster name, used for tags and DNS ownership
    pub cluster: String,
    /// DNS zone holding the cluster records; derived from `cluster` when absent
    #[serde(default)]
    pub dns_zone: Option<String>,
    #[serde(default)]
    pub resources: Vec<DesiredResource>,
}

impl DesiredSet {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let set: DesiredSet = serde_yaml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject empty cluster names and duplicate `(type, name)` keys
    pub fn validate(&self) -> Result<()> {
        if self.cluster.trim().is_empty() {
            return Err(CloudError::InvalidDesiredState(
                "cluster name is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name().is_empty() {
                return Err(CloudError::InvalidDesiredState(format!(
                    "a {} has an empty name",
                    resource.resource_type()
                )));
            }
            if !seen.insert((resource.resource_type(), resource.name())) {
                return Err(CloudError::InvalidDesiredState(format!(
                    "duplicate resource {}",
                    resource.key()
                )));
            }
        }
        Ok(())
    }

    /// Resources in the order they must be reconciled
    pub fn in_creation_order(&self) -> Vec<&DesiredResource> {
        let mut ordered: Vec<&DesiredResource> = self.resources.iter().collect();
        ordered.sort_by_key(|r| r.resource_type().creation_rank());
        ordered
    }

    pub fn dns_zone(&self) -> Option<String> {
        self.dns_zone
            .clone()
            .or_else(|| crate::handlers::dns::default_zone(&self.cluster))
    }
}
