//! Compute instances

use super::{exact_name, wait_until_gone};
use crate::api::{InstanceApi, VpcApi};
use crate::desired::{DesiredResource, InstanceSpec};
use crate::error::{CloudError, Result};
use crate::handler::ResourceHandler;
use crate::model::{CreateServerRequest, ListFilter, Server, ServerState};
use crate::power::reach_state;
use crate::resource::{ResourceHandle, ResourceType};
use crate::tags::cluster_tag;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

fn sorted(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.sort();
    tags
}

/// User-data key read by cloud-init on first boot
pub const CLOUD_INIT_KEY: &str = "cloud-init";

pub struct InstanceHandler {
    api: Arc<dyn InstanceApi>,
    vpc: Arc<dyn VpcApi>,
    wait: WaitConfig,
    cancel: Option<CancellationToken>,
}

impl InstanceHandler {
    pub fn new(api: Arc<dyn InstanceApi>, vpc: Arc<dyn VpcApi>, wait: WaitConfig) -> Self {
        Self {
            api,
            vpc,
            wait,
            cancel: None,
        }
    }

    /// Stop waiting once `token` is cancelled
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    async fn private_network_id(&self, name: &str) -> Result<String> {
        let networks = self
            .vpc
            .list_private_networks(&ListFilter::by_name(name))
            .await?;
        exact_name(networks, name, |pn| pn.name.as_str())
            .into_iter()
            .next()
            .map(|pn| pn.id)
            .ok_or_else(|| {
                CloudError::InvalidDesiredState(format!("private network {} does not exist", name))
            })
    }

    /// Copy the root volume's tags onto the server's volume map
    async fn with_root_volume_tags(&self, mut server: Server) -> Result<Server> {
        let Some(root) = server.volumes.get_mut("0") else {
            return Ok(server);
        };
        match self.api.get_volume(&root.id).await {
            Ok(volume) => root.tags = volume.tags,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        Ok(server)
    }

    async fn attach(&self, server: &Server, pn_id: &str) -> Result<()> {
        if server.is_attached_to(pn_id) {
            return Ok(());
        }
        let nic = self.api.create_private_nic(&server.id, pn_id).await?;
        debug!(server = %server.id, nic = %nic.id, private_network = %pn_id, "attached private NIC");
        Ok(())
    }

    async fn power_on(&self, id: &str) -> Result<Server> {
        let cancel = self.cancel.as_ref();
        reach_state(self.api.as_ref(), id, ServerState::Running, &self.wait, cancel).await
    }
}

#[async_trait]
impl ResourceHandler for InstanceHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Instance
    }

    fn bound_zone(&self) -> Option<&str> {
        Some(self.api.zone())
    }

    async fn list(&self, cluster: &str) -> Result<Vec<ResourceHandle>> {
        let servers = self
            .api
            .list_servers(&ListFilter::by_tag(cluster_tag(cluster)))
            .await?;
        Ok(servers.into_iter().map(ResourceHandle::from).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let servers = self.api.list_servers(&ListFilter::by_name(name)).await?;
        let mut handles = Vec::new();
        for server in exact_name(servers, name, |s| s.name.as_str()) {
            handles.push(self.with_root_volume_tags(server).await?.into());
        }
        Ok(handles)
    }

    async fn get(&self, id: &str) -> Result<ResourceHandle> {
        let server = self.api.get_server(id).await?;
        Ok(self.with_root_volume_tags(server).await?.into())
    }

    /// Create one server of the group and provision it up to running.
    ///
    /// Name and tags are set by the first call, so a server left behind by an
    /// interrupted run is found again and finished by `update`.
    async fn create(&self, desired: &DesiredResource) -> Result<ResourceHandle> {
        let spec: &InstanceSpec = desired.as_instance()?;
        let pn_id = match &spec.private_network {
            Some(name) => Some(self.private_network_id(name).await?),
            None => None,
        };

        let server = self
            .api
            .create_server(&CreateServerRequest {
                name: spec.name.clone(),
                commercial_type: spec.commercial_type.clone(),
                image: spec.image.clone(),
                tags: spec.tags.clone(),
            })
            .await?;
        info!(server = %server.id, name = %server.name, "created server");

        if let Some(root) = server.root_volume() {
            self.api.set_volume_tags(&root.id, &spec.tags).await?;
        }
        if let Some(user_data) = &spec.user_data {
            self.api
                .set_user_data(&server.id, CLOUD_INIT_KEY, user_data)
                .await?;
        }
        if let Some(pn_id) = &pn_id {
            self.attach(&server, pn_id).await?;
        }

        let server = self.power_on(&server.id).await?;
        Ok(server.into())
    }

    /// Finish provisioning and sync tags of an existing server.
    ///
    /// A server that never reached running gets its user data again, since
    /// the run that created it may have stopped before uploading it.
    async fn update(
        &self,
        handle: &ResourceHandle,
        desired: &DesiredResource,
    ) -> Result<ResourceHandle> {
        let spec = desired.as_instance()?;
        let server = match handle.as_server() {
            Some(server) => server.clone(),
            None => {
                let server = self.api.get_server(&handle.id).await?;
                self.with_root_volume_tags(server).await?
            }
        };

        let wanted = sorted(&spec.tags);
        if !wanted.is_empty() {
            if sorted(&server.tags) != wanted {
                info!(server = %server.id, "updating tags");
                self.api.set_server_tags(&server.id, &spec.tags).await?;
            }
            if let Some(root) = server.root_volume() {
                if sorted(&root.tags) != wanted {
                    debug!(server = %server.id, volume = %root.id, "tagging root volume");
                    self.api.set_volume_tags(&root.id, &spec.tags).await?;
                }
            }
        }

        if server.state != ServerState::Running {
            if let Some(user_data) = &spec.user_data {
                self.api
                    .set_user_data(&server.id, CLOUD_INIT_KEY, user_data)
                    .await?;
            }
        }

        if let Some(name) = &spec.private_network {
            let pn_id = self.private_network_id(name).await?;
            self.attach(&server, &pn_id).await?;
        }

        let server = if server.state == ServerState::Running {
            self.api.get_server(&server.id).await?
        } else {
            info!(server = %server.id, state = %server.state, "powering on");
            self.power_on(&server.id).await?
        };
        Ok(self.with_root_volume_tags(server).await?.into())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        let id = handle.id.as_str();
        let cancel = self.cancel.as_ref();
        match reach_state(self.api.as_ref(), id, ServerState::Stopped, &self.wait, cancel).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(server = %id, "server already deleted");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        info!(server = %id, name = %handle.name, "deleting server");
        match self.api.delete_server(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }
        wait_until_gone(
            &format!("server {}", id),
            &self.wait,
            self.cancel.as_ref(),
            || self.api.get_server(id),
        )
        .await
    }
}
