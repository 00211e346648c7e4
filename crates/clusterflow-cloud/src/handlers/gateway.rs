//! Public gateways
//!
//! Gateways are discovered and deleted but never created here.

use super::{exact_name, wait_until_gone};
use crate::api::GatewayApi;
use crate::desired::DesiredResource;
use crate::error::{CloudError, Result};
use crate::handler::ResourceHandler;
use crate::model::ListFilter;
use crate::resource::{ResourceHandle, ResourceType};
use crate::tags::cluster_tag;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct GatewayHandler {
    api: Arc<dyn GatewayApi>,
    wait: WaitConfig,
    cancel: Option<CancellationToken>,
}

impl GatewayHandler {
    pub fn new(api: Arc<dyn GatewayApi>, wait: WaitConfig) -> Self {
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

    async fn detach_networks(&self, gateway_id: &str) -> Result<()> {
        for link in self.api.list_gateway_networks(gateway_id).await? {
            debug!(gateway = %gateway_id, link = %link.id, private_network = %link.private_network_id, "detaching private network");
            match self.api.delete_gateway_network(&link.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for GatewayHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Gateway
    }

    async fn list(&self, cluster: &str) -> Result<Vec<ResourceHandle>> {
        let gateways = self
            .api
            .list_gateways(&ListFilter::by_tag(cluster_tag(cluster)))
            .await?;
        Ok(gateways.into_iter().map(ResourceHandle::from).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let gateways = self.api.list_gateways(&ListFilter::by_name(name)).await?;
        Ok(exact_name(gateways, name, |gw| gw.name.as_str())
            .into_iter()
            .map(ResourceHandle::from)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<ResourceHandle> {
        Ok(self.api.get_gateway(id).await?.into())
    }

    async fn create(&self, _desired: &DesiredResource) -> Result<ResourceHandle> {
        Err(CloudError::unsupported(ResourceType::Gateway, "create"))
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        let id = handle.id.as_str();
        self.detach_networks(id).await?;

        info!(gateway = %id, name = %handle.name, "deleting gateway");
        self.api.delete_gateway(id).await?;
        wait_until_gone(
            &format!("gateway {}", id),
            &self.wait,
            self.cancel.as_ref(),
            || self.api.get_gateway(id),
        )
        .await
    }
}
