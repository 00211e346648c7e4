//! Private networks

use super::{exact_name, wait_until_gone};
use crate::api::VpcApi;
use crate::desired::DesiredResource;
use crate::error::Result;
use crate::handler::ResourceHandler;
use crate::model::{CreatePrivateNetworkRequest, ListFilter};
use crate::resource::{ResourceHandle, ResourceType};
use crate::tags::cluster_tag;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct PrivateNetworkHandler {
    api: Arc<dyn VpcApi>,
    wait: WaitConfig,
    cancel: Option<CancellationToken>,
}

impl PrivateNetworkHandler {
    pub fn new(api: Arc<dyn VpcApi>, wait: WaitConfig) -> Self {
        Self {
            api,
            wait,
            cancel: None,
        }
    }

    /// Stop waiting once `token` is cancelled
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[async_trait]
impl ResourceHandler for PrivateNetworkHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::PrivateNetwork
    }

    fn bound_zone(&self) -> Option<&str> {
        Some(self.api.zone())
    }

    async fn list(&self, cluster: &str) -> Result<Vec<ResourceHandle>> {
        let networks = self
            .api
            .list_private_networks(&ListFilter::by_tag(cluster_tag(cluster)))
            .await?;
        Ok(networks.into_iter().map(ResourceHandle::from).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let networks = self
            .api
            .list_private_networks(&ListFilter::by_name(name))
            .await?;
        Ok(exact_name(networks, name, |pn| pn.name.as_str())
            .into_iter()
            .map(ResourceHandle::from)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<ResourceHandle> {
        Ok(self.api.get_private_network(id).await?.into())
    }

    async fn create(&self, desired: &DesiredResource) -> Result<ResourceHandle> {
        let spec = desired.as_private_network()?;
        let network = self
            .api
            .create_private_network(&CreatePrivateNetworkRequest {
                name: spec.name.clone(),
                tags: spec.tags.clone(),
                subnets: spec.ip_range.iter().cloned().collect(),
            })
            .await?;
        info!(private_network = %network.id, name = %network.name, "created private network");
        Ok(network.into())
    }

    async fn update(
        &self,
        handle: &ResourceHandle,
        desired: &DesiredResource,
    ) -> Result<ResourceHandle> {
        let spec = desired.as_private_network()?;
        info!(private_network = %handle.id, "updating tags");
        Ok(self
            .api
            .set_private_network_tags(&handle.id, &spec.tags)
            .await?
            .into())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        let id = handle.id.as_str();
        info!(private_network = %id, name = %handle.name, "deleting private network");
        self.api.delete_private_network(id).await?;
        let cancel = self.cancel.as_ref();
        wait_until_gone(&format!("private network {}", id), &self.wait, cancel, || {
            self.api.get_private_network(id)
        })
        .await
    }
}
