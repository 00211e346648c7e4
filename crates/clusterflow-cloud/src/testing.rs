//! In-memory cloud used by the engine's tests.
//!
//! Power actions and deletions complete instantly. The fake enforces the
//! dependency rules of the real API (attached volumes, networks in use,
//! running servers) so ordering mistakes surface as errors.

use crate::api::{DomainApi, GatewayApi, InstanceApi, LbApi, VpcApi};
use crate::error::{CloudError, Result};
use crate::model::*;
use crate::resource::ResourceType;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use chrono::DateTime;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// Zone the fake places every zoned resource in
pub(crate) const FAKE_ZONE: &str = "fr-par-1";

pub(crate) fn fast_wait() -> WaitConfig {
    WaitConfig::new(Duration::from_secs(1), Duration::from_secs(60))
}

/// A recorded mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub op: &'static str,
    pub target: String,
}

const DELETE_OPS: [&str; 6] = [
    "delete_server",
    "delete_volume",
    "delete_private_network",
    "delete_gateway",
    "delete_load_balancer",
    "delete_record",
];

#[derive(Default)]
struct State {
    next_id: u64,
    servers: BTreeMap<String, Server>,
    volumes: BTreeMap<String, Volume>,
    networks: BTreeMap<String, PrivateNetwork>,
    gateways: BTreeMap<String, Gateway>,
    gateway_networks: BTreeMap<String, GatewayNetwork>,
    load_balancers: BTreeMap<String, LoadBalancer>,
    records: BTreeMap<String, (String, DnsRecord)>,
    user_data: BTreeMap<(String, String), String>,
    busy_volumes: HashMap<String, u32>,
    volume_polls: HashMap<String, u32>,
    calls: Vec<Call>,
    actions: Vec<(String, ServerAction)>,
    released_ips: Vec<String>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn record(&mut self, op: &'static str, target: &str) {
        self.calls.push(Call {
            op,
            target: target.to_string(),
        });
    }

    fn new_server(&mut self, name: &str, tags: &[String], state: ServerState) -> Server {
        let id = self.id("srv");
        let root_id = self.id("vol");
        // one minute apart so "newest" is well defined
        let created = DateTime::from_timestamp(1_700_000_000 + self.next_id as i64 * 60, 0);

        self.volumes.insert(
            root_id.clone(),
            Volume {
                id: root_id.clone(),
                name: format!("{}-root", name),
                zone: FAKE_ZONE.to_string(),
                size: 20_000_000_000,
                volume_type: "l_ssd".to_string(),
                state: VolumeState::Available,
                tags: Vec::new(),
                server: Some(VolumeServer {
                    id: id.clone(),
                    name: name.to_string(),
                }),
                creation_date: created,
            },
        );

        let mut volumes = BTreeMap::new();
        volumes.insert(
            "0".to_string(),
            ServerVolume {
                id: root_id,
                name: format!("{}-root", name),
                state: VolumeState::Available,
                tags: Vec::new(),
            },
        );

        let server = Server {
            id: id.clone(),
            name: name.to_string(),
            zone: FAKE_ZONE.to_string(),
            commercial_type: "DEV1-M".to_string(),
            image: Some(ServerImage {
                id: "img-ubuntu".to_string(),
                name: "ubuntu_jammy".to_string(),
            }),
            tags: tags.to_vec(),
            state,
            volumes,
            private_nics: Vec::new(),
            public_ip: Some(ServerIp {
                address: format!("51.15.0.{}", self.next_id),
            }),
            private_ip: None,
            creation_date: created,
        };
        self.servers.insert(id, server.clone());
        server
    }

    fn server(&self, id: &str) -> Result<&Server> {
        self.servers
            .get(id)
            .ok_or_else(|| CloudError::not_found(ResourceType::Instance, id))
    }

    fn server_mut(&mut self, id: &str) -> Result<&mut Server> {
        self.servers
            .get_mut(id)
            .ok_or_else(|| CloudError::not_found(ResourceType::Instance, id))
    }
}

fn selected(filter: &ListFilter, name: &str, tags: &[String]) -> bool {
    filter.name.as_ref().is_none_or(|n| name.contains(n.as_str()))
        && filter.tags.iter().all(|t| tags.contains(t))
}

pub(crate) struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // ---- setup (not recorded) ----

    pub fn add_server(&self, name: &str, tags: &[String], state: ServerState) -> String {
        self.lock().new_server(name, tags, state).id
    }

    pub fn root_volume_of(&self, server_id: &str) -> String {
        self.lock().servers[server_id].volumes["0"].id.clone()
    }

    pub fn set_volume_busy(&self, volume_id: &str, polls: u32) {
        self.lock().busy_volumes.insert(volume_id.to_string(), polls);
    }

    pub fn volume_polls(&self, volume_id: &str) -> u32 {
        self.lock()
            .volume_polls
            .get(volume_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn add_volume(&self, name: &str, tags: &[String]) -> String {
        let mut state = self.lock();
        let id = state.id("vol");
        state.volumes.insert(
            id.clone(),
            Volume {
                id: id.clone(),
                name: name.to_string(),
                zone: FAKE_ZONE.to_string(),
                size: 20_000_000_000,
                volume_type: "b_ssd".to_string(),
                state: VolumeState::Available,
                tags: tags.to_vec(),
                server: None,
                creation_date: None,
            },
        );
        id
    }

    pub fn attach_volume(&self, volume_id: &str, server_id: &str) {
        let mut state = self.lock();
        let server_name = state.servers[server_id].name.clone();
        let volume = state.volumes.get_mut(volume_id).unwrap();
        volume.server = Some(VolumeServer {
            id: server_id.to_string(),
            name: server_name,
        });
        let entry = ServerVolume {
            id: volume.id.clone(),
            name: volume.name.clone(),
            state: volume.state,
            tags: Vec::new(),
        };
        let server = state.servers.get_mut(server_id).unwrap();
        let slot = server.volumes.len().to_string();
        server.volumes.insert(slot, entry);
    }

    pub fn add_private_network(&self, name: &str, tags: &[String]) -> String {
        let mut state = self.lock();
        let id = state.id("pn");
        state.networks.insert(
            id.clone(),
            PrivateNetwork {
                id: id.clone(),
                name: name.to_string(),
                zone: FAKE_ZONE.to_string(),
                tags: tags.to_vec(),
                subnets: vec!["172.16.0.0/22".to_string()],
            },
        );
        id
    }

    pub fn attach_nic(&self, server_id: &str, private_network_id: &str) {
        let mut state = self.lock();
        let id = state.id("nic");
        state
            .servers
            .get_mut(server_id)
            .unwrap()
            .private_nics
            .push(PrivateNic {
                id,
                private_network_id: private_network_id.to_string(),
                server_id: server_id.to_string(),
            });
    }

    pub fn add_gateway(&self, name: &str, tags: &[String], private_network: Option<&str>) -> String {
        let mut state = self.lock();
        let id = state.id("gw");
        state.gateways.insert(
            id.clone(),
            Gateway {
                id: id.clone(),
                name: name.to_string(),
                zone: FAKE_ZONE.to_string(),
                tags: tags.to_vec(),
                status: "running".to_string(),
            },
        );
        if let Some(pn) = private_network {
            let link = state.id("gwn");
            state.gateway_networks.insert(
                link.clone(),
                GatewayNetwork {
                    id: link,
                    gateway_id: id.clone(),
                    private_network_id: pn.to_string(),
                },
            );
        }
        id
    }

    pub fn add_load_balancer(&self, name: &str, tags: &[String]) -> String {
        let mut state = self.lock();
        let id = state.id("lb");
        let n = state.next_id;
        state.load_balancers.insert(
            id.clone(),
            LoadBalancer {
                id: id.clone(),
                name: name.to_string(),
                region: "fr-par".to_string(),
                tags: tags.to_vec(),
                status: "ready".to_string(),
                lb_type: "LB-S".to_string(),
                ip: vec![LbIp {
                    id: format!("ip-{}", n),
                    ip_address: format!("51.159.0.{}", n),
                }],
            },
        );
        id
    }

    pub fn add_record(&self, zone: &str, name: &str, record_type: &str, data: &str) -> String {
        let mut state = self.lock();
        let id = state.id("rec");
        state.records.insert(
            id.clone(),
            (
                zone.to_string(),
                DnsRecord {
                    id: id.clone(),
                    name: name.to_string(),
                    record_type: record_type.to_string(),
                    data: data.to_string(),
                    ttl: 60,
                },
            ),
        );
        id
    }

    /// Make a resource vanish without recording a call
    pub fn remove(&self, id: &str) {
        let mut state = self.lock();
        state.servers.remove(id);
        state.volumes.remove(id);
        state.networks.remove(id);
        state.gateways.remove(id);
        state.load_balancers.remove(id);
        state.records.remove(id);
    }

    // ---- inspection ----

    pub fn exists(&self, id: &str) -> bool {
        let state = self.lock();
        state.servers.contains_key(id)
            || state.volumes.contains_key(id)
            || state.networks.contains_key(id)
            || state.gateways.contains_key(id)
            || state.load_balancers.contains_key(id)
            || state.records.contains_key(id)
    }

    pub fn servers_named(&self, name: &str) -> Vec<Server> {
        self.lock()
            .servers
            .values()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    pub fn user_data(&self, server_id: &str, key: &str) -> Option<String> {
        self.lock()
            .user_data
            .get(&(server_id.to_string(), key.to_string()))
            .cloned()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn mutation_ops(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(|c| c.op).collect()
    }

    /// IDs of deleted resources, in deletion order
    pub fn deleted(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| DELETE_OPS.contains(&c.op))
            .map(|c| c.target.clone())
            .collect()
    }

    pub fn actions_for(&self, server_id: &str) -> Vec<ServerAction> {
        self.lock()
            .actions
            .iter()
            .filter(|(id, _)| id == server_id)
            .map(|(_, a)| *a)
            .collect()
    }

    pub fn released_ips(&self) -> Vec<String> {
        self.lock().released_ips.clone()
    }
}

#[async_trait]
impl InstanceApi for FakeCloud {
    fn zone(&self) -> &str {
        FAKE_ZONE
    }

    async fn list_servers(&self, filter: &ListFilter) -> Result<Vec<Server>> {
        Ok(self
            .lock()
            .servers
            .values()
            .filter(|s| selected(filter, &s.name, &s.tags))
            .cloned()
            .collect())
    }

    async fn get_server(&self, id: &str) -> Result<Server> {
        self.lock().server(id).cloned()
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server> {
        let mut state = self.lock();
        let server = state.new_server(&request.name, &request.tags, ServerState::Stopped);
        state.record("create_server", &server.id);
        Ok(server)
    }

    async fn server_action(&self, id: &str, action: ServerAction) -> Result<()> {
        let mut state = self.lock();
        state.server_mut(id)?.state = match action {
            ServerAction::Poweron | ServerAction::Reboot => ServerState::Running,
            ServerAction::Poweroff => ServerState::Stopped,
            ServerAction::StopInPlace => ServerState::StoppedInPlace,
        };
        state.record("server_action", id);
        state.actions.push((id.to_string(), action));
        Ok(())
    }

    async fn set_server_tags(&self, id: &str, tags: &[String]) -> Result<Server> {
        let mut state = self.lock();
        let server = state.server_mut(id)?;
        server.tags = tags.to_vec();
        let server = server.clone();
        state.record("set_server_tags", id);
        Ok(server)
    }

    async fn set_user_data(&self, id: &str, key: &str, content: &str) -> Result<()> {
        let mut state = self.lock();
        state.server(id)?;
        state
            .user_data
            .insert((id.to_string(), key.to_string()), content.to_string());
        state.record("set_user_data", id);
        Ok(())
    }

    async fn create_private_nic(
        &self,
        server_id: &str,
        private_network_id: &str,
    ) -> Result<PrivateNic> {
        let mut state = self.lock();
        if !state.networks.contains_key(private_network_id) {
            return Err(CloudError::not_found(
                ResourceType::PrivateNetwork,
                private_network_id,
            ));
        }
        let id = state.id("nic");
        let nic = PrivateNic {
            id,
            private_network_id: private_network_id.to_string(),
            server_id: server_id.to_string(),
        };
        state.server_mut(server_id)?.private_nics.push(nic.clone());
        state.record("create_private_nic", server_id);
        Ok(nic)
    }

    async fn delete_server(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let server = state.server(id)?;
        if server.state != ServerState::Stopped {
            return Err(CloudError::ApiError(format!(
                "server {} must be stopped before deletion (state: {})",
                id, server.state
            )));
        }
        let attached: Vec<String> = server.volumes.values().map(|v| v.id.clone()).collect();
        for volume_id in attached {
            if let Some(volume) = state.volumes.get_mut(&volume_id) {
                volume.server = None;
            }
        }
        state.servers.remove(id);
        state.record("delete_server", id);
        Ok(())
    }

    async fn list_volumes(&self, filter: &ListFilter) -> Result<Vec<Volume>> {
        Ok(self
            .lock()
            .volumes
            .values()
            .filter(|v| selected(filter, &v.name, &v.tags))
            .cloned()
            .collect())
    }

    async fn get_volume(&self, id: &str) -> Result<Volume> {
        let mut state = self.lock();
        *state.volume_polls.entry(id.to_string()).or_insert(0) += 1;
        let mut volume = state
            .volumes
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::not_found(ResourceType::Volume, id))?;
        if let Some(remaining) = state.busy_volumes.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                volume.state = VolumeState::Snapshotting;
            }
        }
        Ok(volume)
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume> {
        let mut state = self.lock();
        let id = state.id("vol");
        let volume = Volume {
            id: id.clone(),
            name: request.name.clone(),
            zone: FAKE_ZONE.to_string(),
            size: request.size,
            volume_type: request.volume_type.clone(),
            state: VolumeState::Available,
            tags: request.tags.clone(),
            server: None,
            creation_date: None,
        };
        state.volumes.insert(id.clone(), volume.clone());
        state.record("create_volume", &id);
        Ok(volume)
    }

    async fn set_volume_tags(&self, id: &str, tags: &[String]) -> Result<Volume> {
        let mut state = self.lock();
        let volume = state
            .volumes
            .get_mut(id)
            .ok_or_else(|| CloudError::not_found(ResourceType::Volume, id))?;
        volume.tags = tags.to_vec();
        let volume = volume.clone();
        state.record("set_volume_tags", id);
        Ok(volume)
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let volume = state
            .volumes
            .get(id)
            .ok_or_else(|| CloudError::not_found(ResourceType::Volume, id))?;
        if let Some(server) = &volume.server {
            if state.servers.contains_key(&server.id) {
                return Err(CloudError::ApiError(format!(
                    "volume {} is attached to server {}",
                    id, server.id
                )));
            }
        }
        state.volumes.remove(id);
        state.record("delete_volume", id);
        Ok(())
    }
}

#[async_trait]
impl VpcApi for FakeCloud {
    fn zone(&self) -> &str {
        FAKE_ZONE
    }

    async fn list_private_networks(&self, filter: &ListFilter) -> Result<Vec<PrivateNetwork>> {
        Ok(self
            .lock()
            .networks
            .values()
            .filter(|pn| selected(filter, &pn.name, &pn.tags))
            .cloned()
            .collect())
    }

    async fn get_private_network(&self, id: &str) -> Result<PrivateNetwork> {
        self.lock()
            .networks
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::not_found(ResourceType::PrivateNetwork, id))
    }

    async fn create_private_network(
        &self,
        request: &CreatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork> {
        let mut state = self.lock();
        let id = state.id("pn");
        let network = PrivateNetwork {
            id: id.clone(),
            name: request.name.clone(),
            zone: FAKE_ZONE.to_string(),
            tags: request.tags.clone(),
            subnets: request.subnets.clone(),
        };
        state.networks.insert(id.clone(), network.clone());
        state.record("create_private_network", &id);
        Ok(network)
    }

    async fn set_private_network_tags(&self, id: &str, tags: &[String]) -> Result<PrivateNetwork> {
        let mut state = self.lock();
        let network = state
            .networks
            .get_mut(id)
            .ok_or_else(|| CloudError::not_found(ResourceType::PrivateNetwork, id))?;
        network.tags = tags.to_vec();
        let network = network.clone();
        state.record("set_private_network_tags", id);
        Ok(network)
    }

    async fn delete_private_network(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.networks.contains_key(id) {
            return Err(CloudError::not_found(ResourceType::PrivateNetwork, id));
        }
        let used_by_server = state
            .servers
            .values()
            .any(|s| s.is_attached_to(id));
        let used_by_gateway = state
            .gateway_networks
            .values()
            .any(|gwn| gwn.private_network_id == id);
        if used_by_server || used_by_gateway {
            return Err(CloudError::ApiError(format!(
                "private network {} is still in use",
                id
            )));
        }
        state.networks.remove(id);
        state.record("delete_private_network", id);
        Ok(())
    }
}

#[async_trait]
impl GatewayApi for FakeCloud {
    async fn list_gateways(&self, filter: &ListFilter) -> Result<Vec<Gateway>> {
        Ok(self
            .lock()
            .gateways
            .values()
            .filter(|gw| selected(filter, &gw.name, &gw.tags))
            .cloned()
            .collect())
    }

    async fn get_gateway(&self, id: &str) -> Result<Gateway> {
        self.lock()
            .gateways
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::not_found(ResourceType::Gateway, id))
    }

    async fn delete_gateway(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.gateways.contains_key(id) {
            return Err(CloudError::not_found(ResourceType::Gateway, id));
        }
        if state.gateway_networks.values().any(|gwn| gwn.gateway_id == id) {
            return Err(CloudError::ApiError(format!(
                "gateway {} still has attached networks",
                id
            )));
        }
        state.gateways.remove(id);
        state.record("delete_gateway", id);
        Ok(())
    }

    async fn list_gateway_networks(&self, gateway_id: &str) -> Result<Vec<GatewayNetwork>> {
        Ok(self
            .lock()
            .gateway_networks
            .values()
            .filter(|gwn| gwn.gateway_id == gateway_id)
            .cloned()
            .collect())
    }

    async fn delete_gateway_network(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.gateway_networks.remove(id).is_none() {
            return Err(CloudError::ApiError(format!(
                "gateway network {} not found",
                id
            )));
        }
        state.record("delete_gateway_network", id);
        Ok(())
    }
}

#[async_trait]
impl LbApi for FakeCloud {
    async fn list_load_balancers(&self, filter: &ListFilter) -> Result<Vec<LoadBalancer>> {
        Ok(self
            .lock()
            .load_balancers
            .values()
            .filter(|lb| selected(filter, &lb.name, &lb.tags))
            .cloned()
            .collect())
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer> {
        self.lock()
            .load_balancers
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::not_found(ResourceType::LoadBalancer, id))
    }

    async fn create_load_balancer(
        &self,
        request: &CreateLoadBalancerRequest,
    ) -> Result<LoadBalancer> {
        let id = self.add_load_balancer(&request.name, &request.tags);
        let mut state = self.lock();
        let lb = state.load_balancers.get_mut(&id).unwrap();
        lb.lb_type = request.lb_type.clone();
        let lb = lb.clone();
        state.record("create_load_balancer", &id);
        Ok(lb)
    }

    async fn set_load_balancer_tags(&self, id: &str, tags: &[String]) -> Result<LoadBalancer> {
        let mut state = self.lock();
        let lb = state
            .load_balancers
            .get_mut(id)
            .ok_or_else(|| CloudError::not_found(ResourceType::LoadBalancer, id))?;
        lb.tags = tags.to_vec();
        let lb = lb.clone();
        state.record("set_load_balancer_tags", id);
        Ok(lb)
    }

    async fn delete_load_balancer(&self, id: &str, release_ip: bool) -> Result<()> {
        let mut state = self.lock();
        if state.load_balancers.remove(id).is_none() {
            return Err(CloudError::not_found(ResourceType::LoadBalancer, id));
        }
        if release_ip {
            state.released_ips.push(id.to_string());
        }
        state.record("delete_load_balancer", id);
        Ok(())
    }
}

#[async_trait]
impl DomainApi for FakeCloud {
    async fn list_records(&self, zone: &str) -> Result<Vec<DnsRecord>> {
        Ok(self
            .lock()
            .records
            .values()
            .filter(|(z, _)| z.as_str() == zone)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(
        &self,
        zone: &str,
        request: &CreateDnsRecordRequest,
    ) -> Result<DnsRecord> {
        let id = self.add_record(zone, &request.name, &request.record_type, &request.data);
        let mut state = self.lock();
        let (_, record) = state.records.get_mut(&id).unwrap();
        record.ttl = request.ttl;
        let record = record.clone();
        state.record("create_record", &id);
        Ok(record)
    }

    async fn update_record(&self, zone: &str, id: &str, data: &str, ttl: u32) -> Result<DnsRecord> {
        let mut state = self.lock();
        let record = match state.records.get_mut(id) {
            Some((z, record)) if z.as_str() == zone => record,
            _ => return Err(CloudError::not_found(ResourceType::DnsRecord, id)),
        };
        record.data = data.to_string();
        record.ttl = ttl;
        let record = record.clone();
        state.record("update_record", id);
        Ok(record)
    }

    async fn delete_record(&self, zone: &str, id: &str) -> Result<()> {
        let mut state = self.lock();
        match state.records.get(id) {
            Some((z, _)) if z.as_str() == zone => {}
            _ => return Err(CloudError::not_found(ResourceType::DnsRecord, id)),
        }
        state.records.remove(id);
        state.record("delete_record", id);
        Ok(())
    }
}
