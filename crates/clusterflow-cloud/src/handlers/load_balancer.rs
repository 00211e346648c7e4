//! Load balancers
//!
//! A cluster owns exactly one load balancer, found by its conventional name
//! rather than by tag.

use super::{exact_name, wait_until_gone};
use crate::api::LbApi;
use crate::desired::DesiredResource;
use crate::error::Result;
use crate::handler::ResourceHandler;
use crate::model::{CreateLoadBalancerRequest, ListFilter};
use crate::resource::{ResourceHandle, ResourceType};
use crate::tags::load_balancer_name;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct LoadBalancerHandler {
    api: Arc<dyn LbApi>,
    wait: WaitConfig,
    cancel: Option<CancellationToken>,
}

impl LoadBalancerHandler {
    pub fn new(api: Arc<dyn LbApi>, wait: WaitConfig) -> Self {
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
impl ResourceHandler for LoadBalancerHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::LoadBalancer
    }

    async fn list(&self, cluster: &str) -> Result<Vec<ResourceHandle>> {
        self.find_by_name(&load_balancer_name(cluster)).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let lbs = self
            .api
            .list_load_balancers(&ListFilter::by_name(name))
            .await?;
        Ok(exact_name(lbs, name, |lb| lb.name.as_str())
            .into_iter()
            .map(ResourceHandle::from)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<ResourceHandle> {
        Ok(self.api.get_load_balancer(id).await?.into())
    }

    async fn create(&self, desired: &DesiredResource) -> Result<ResourceHandle> {
        let spec = desired.as_load_balancer()?;
        let lb = self
            .api
            .create_load_balancer(&CreateLoadBalancerRequest {
                name: spec.name.clone(),
                lb_type: spec.lb_type.clone(),
                tags: spec.tags.clone(),
            })
            .await?;
        info!(load_balancer = %lb.id, name = %lb.name, addresses = ?lb.addresses(), "created load balancer");
        Ok(lb.into())
    }

    async fn update(
        &self,
        handle: &ResourceHandle,
        desired: &DesiredResource,
    ) -> Result<ResourceHandle> {
        let spec = desired.as_load_balancer()?;
        info!(load_balancer = %handle.id, "updating tags");
        Ok(self
            .api
            .set_load_balancer_tags(&handle.id, &spec.tags)
            .await?
            .into())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        let id = handle.id.as_str();
        info!(load_balancer = %id, name = %handle.name, "deleting load balancer and releasing its IP");
        self.api.delete_load_balancer(id, true).await?;
        let cancel = self.cancel.as_ref();
        wait_until_gone(&format!("load balancer {}", id), &self.wait, cancel, || {
            self.api.get_load_balancer(id)
        })
        .await
    }
}
