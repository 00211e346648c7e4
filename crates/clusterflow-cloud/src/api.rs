//! Cloud capability traits
//!
//! Handlers never talk HTTP themselves. Each handler is constructed with the
//! capabilities it needs, and a binding crate (or the in-memory fake used in
//! tests) implements them. Clients are bound to a single zone and region at
//! construction, so no call takes a zone parameter.

use crate::error::Result;
use crate::model::{
    CreateDnsRecordRequest, CreateLoadBalancerRequest, CreatePrivateNetworkRequest,
    CreateServerRequest, CreateVolumeRequest, DnsRecord, Gateway, GatewayNetwork, ListFilter,
    LoadBalancer, PrivateNetwork, PrivateNic, Server, ServerAction, Volume,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Servers, volumes and private NICs
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Zone every server and volume call is made in
    fn zone(&self) -> &str;

    async fn list_servers(&self, filter: &ListFilter) -> Result<Vec<Server>>;

    async fn get_server(&self, id: &str) -> Result<Server>;

    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server>;

    /// Issue a power action; the server changes state asynchronously.
    async fn server_action(&self, id: &str, action: ServerAction) -> Result<()>;

    async fn set_server_tags(&self, id: &str, tags: &[String]) -> Result<Server>;

    /// Upload a user-data entry (e.g. `cloud-init`) for the server
    async fn set_user_data(&self, id: &str, key: &str, content: &str) -> Result<()>;

    async fn create_private_nic(&self, server_id: &str, private_network_id: &str)
    -> Result<PrivateNic>;

    async fn delete_server(&self, id: &str) -> Result<()>;

    async fn list_volumes(&self, filter: &ListFilter) -> Result<Vec<Volume>>;

    async fn get_volume(&self, id: &str) -> Result<Volume>;

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume>;

    async fn set_volume_tags(&self, id: &str, tags: &[String]) -> Result<Volume>;

    async fn delete_volume(&self, id: &str) -> Result<()>;
}

/// Private networks
#[async_trait]
pub trait VpcApi: Send + Sync {
    /// Zone every private network call is made in
    fn zone(&self) -> &str;

    async fn list_private_networks(&self, filter: &ListFilter) -> Result<Vec<PrivateNetwork>>;

    async fn get_private_network(&self, id: &str) -> Result<PrivateNetwork>;

    async fn create_private_network(
        &self,
        request: &CreatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork>;

    async fn set_private_network_tags(&self, id: &str, tags: &[String]) -> Result<PrivateNetwork>;

    async fn delete_private_network(&self, id: &str) -> Result<()>;
}

/// Public gateways and their private network attachments
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn list_gateways(&self, filter: &ListFilter) -> Result<Vec<Gateway>>;

    async fn get_gateway(&self, id: &str) -> Result<Gateway>;

    async fn delete_gateway(&self, id: &str) -> Result<()>;

    async fn list_gateway_networks(&self, gateway_id: &str) -> Result<Vec<GatewayNetwork>>;

    async fn delete_gateway_network(&self, id: &str) -> Result<()>;
}

/// Load balancers
#[async_trait]
pub trait LbApi: Send + Sync {
    async fn list_load_balancers(&self, filter: &ListFilter) -> Result<Vec<LoadBalancer>>;

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer>;

    async fn create_load_balancer(&self, request: &CreateLoadBalancerRequest)
    -> Result<LoadBalancer>;

    async fn set_load_balancer_tags(&self, id: &str, tags: &[String]) -> Result<LoadBalancer>;

    /// Delete the load balancer, optionally releasing its flexible IPs
    async fn delete_load_balancer(&self, id: &str, release_ip: bool) -> Result<()>;
}

/// DNS zone records
#[async_trait]
pub trait DomainApi: Send + Sync {
    async fn list_records(&self, zone: &str) -> Result<Vec<DnsRecord>>;

    async fn create_record(&self, zone: &str, request: &CreateDnsRecordRequest)
    -> Result<DnsRecord>;

    /// Replace data and TTL of an existing record
    async fn update_record(&self, zone: &str, id: &str, data: &str, ttl: u32) -> Result<DnsRecord>;

    async fn delete_record(&self, zone: &str, id: &str) -> Result<()>;
}

/// All capabilities of one cloud account, shared between handlers
#[derive(Clone)]
pub struct CloudApis {
    pub instance: Arc<dyn InstanceApi>,
    pub vpc: Arc<dyn VpcApi>,
    pub gateway: Arc<dyn GatewayApi>,
    pub lb: Arc<dyn LbApi>,
    pub domain: Arc<dyn DomainApi>,
}

impl CloudApis {
    /// Use one client for every capability
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: InstanceApi + VpcApi + GatewayApi + LbApi + DomainApi + 'static,
    {
        Self {
            instance: client.clone(),
            vpc: client.clone(),
            gateway: client.clone(),
            lb: client.clone(),
            domain: client,
        }
    }
}
