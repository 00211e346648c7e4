//! Resource types and live resource handles

use crate::model::{DnsRecord, Gateway, LoadBalancer, PrivateNetwork, Server, Volume};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of cloud resource managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Instance,
    Volume,
    PrivateNetwork,
    Gateway,
    LoadBalancer,
    DnsRecord,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Instance,
        ResourceType::Volume,
        ResourceType::PrivateNetwork,
        ResourceType::Gateway,
        ResourceType::LoadBalancer,
        ResourceType::DnsRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Instance => "instance",
            ResourceType::Volume => "volume",
            ResourceType::PrivateNetwork => "private-network",
            ResourceType::Gateway => "gateway",
            ResourceType::LoadBalancer => "load-balancer",
            ResourceType::DnsRecord => "dns-record",
        }
    }

    /// Order in which desired resources of this type are reconciled.
    ///
    /// Instances attach to private networks and DNS records point at
    /// addresses, so those come after the things they reference.
    pub fn creation_rank(&self) -> u8 {
        match self {
            ResourceType::PrivateNetwork => 0,
            ResourceType::Gateway => 1,
            ResourceType::Volume => 2,
            ResourceType::LoadBalancer => 3,
            ResourceType::Instance => 4,
            ResourceType::DnsRecord => 5,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown resource type: {}", s))
    }
}

/// Typed cloud object carried by a handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CloudObject {
    Server(Server),
    Volume(Volume),
    PrivateNetwork(PrivateNetwork),
    Gateway(Gateway),
    LoadBalancer(LoadBalancer),
    DnsRecord(DnsRecord),
}

impl CloudObject {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            CloudObject::Server(_) => ResourceType::Instance,
            CloudObject::Volume(_) => ResourceType::Volume,
            CloudObject::PrivateNetwork(_) => ResourceType::PrivateNetwork,
            CloudObject::Gateway(_) => ResourceType::Gateway,
            CloudObject::LoadBalancer(_) => ResourceType::LoadBalancer,
            CloudObject::DnsRecord(_) => ResourceType::DnsRecord,
        }
    }
}

/// A live resource as returned by a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub resource_type: ResourceType,
    pub id: String,
    pub name: String,
    pub object: CloudObject,
}

impl ResourceHandle {
    /// Full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    pub fn as_server(&self) -> Option<&Server> {
        match &self.object {
            CloudObject::Server(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_volume(&self) -> Option<&Volume> {
        match &self.object {
            CloudObject::Volume(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_private_network(&self) -> Option<&PrivateNetwork> {
        match &self.object {
            CloudObject::PrivateNetwork(pn) => Some(pn),
            _ => None,
        }
    }

    pub fn as_gateway(&self) -> Option<&Gateway> {
        match &self.object {
            CloudObject::Gateway(gw) => Some(gw),
            _ => None,
        }
    }

    pub fn as_load_balancer(&self) -> Option<&LoadBalancer> {
        match &self.object {
            CloudObject::LoadBalancer(lb) => Some(lb),
            _ => None,
        }
    }

    pub fn as_dns_record(&self) -> Option<&DnsRecord> {
        match &self.object {
            CloudObject::DnsRecord(r) => Some(r),
            _ => None,
        }
    }

    /// Addresses assigned by the cloud, if any
    pub fn addresses(&self) -> Vec<String> {
        match &self.object {
            CloudObject::Server(s) => s.addresses(),
            CloudObject::LoadBalancer(lb) => lb.addresses(),
            _ => Vec::new(),
        }
    }
}

impl From<Server> for ResourceHandle {
    fn from(server: Server) -> Self {
        Self {
            resource_type: ResourceType::Instance,
            id: server.id.clone(),
            name: server.name.clone(),
            object: CloudObject::Server(server),
        }
    }
}

impl From<Volume> for ResourceHandle {
    fn from(volume: Volume) -> Self {
        Self {
            resource_type: ResourceType::Volume,
            id: volume.id.clone(),
            name: volume.name.clone(),
            object: CloudObject::Volume(volume),
        }
    }
}

impl From<PrivateNetwork> for ResourceHandle {
    fn from(pn: PrivateNetwork) -> Self {
        Self {
            resource_type: ResourceType::PrivateNetwork,
            id: pn.id.clone(),
            name: pn.name.clone(),
            object: CloudObject::PrivateNetwork(pn),
        }
    }
}

impl From<Gateway> for ResourceHandle {
    fn from(gw: Gateway) -> Self {
        Self {
            resource_type: ResourceType::Gateway,
            id: gw.id.clone(),
            name: gw.name.clone(),
            object: CloudObject::Gateway(gw),
        }
    }
}

impl From<LoadBalancer> for ResourceHandle {
    fn from(lb: LoadBalancer) -> Self {
        Self {
            resource_type: ResourceType::LoadBalancer,
            id: lb.id.clone(),
            name: lb.name.clone(),
            object: CloudObject::LoadBalancer(lb),
        }
    }
}

impl From<DnsRecord> for ResourceHandle {
    fn from(record: DnsRecord) -> Self {
        Self {
            resource_type: ResourceType::DnsRecord,
            id: record.id.clone(),
            name: record.name.clone(),
            object: CloudObject::DnsRecord(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_round_trip_names() {
        for t in ResourceType::ALL {
            assert_eq!(t.as_str().parse::<ResourceType>().unwrap(), t);
        }
        assert!("bucket".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_creation_rank_puts_networks_before_instances() {
        assert!(
            ResourceType::PrivateNetwork.creation_rank() < ResourceType::Instance.creation_rank()
        );
        assert!(ResourceType::Instance.creation_rank() < ResourceType::DnsRecord.creation_rank());
    }
}
