//! Block volumes

use super::{exact_name, wait_until_gone};
use crate::api::InstanceApi;
use crate::desired::DesiredResource;
use crate::error::Result;
use crate::handler::ResourceHandler;
use crate::model::{CreateVolumeRequest, ListFilter};
use crate::resource::{ResourceHandle, ResourceType};
use crate::tags::cluster_tag;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Volume type used when the desired value leaves it empty
pub const DEFAULT_VOLUME_TYPE: &str = "b_ssd";

pub struct VolumeHandler {
    api: Arc<dyn InstanceApi>,
    wait: WaitConfig,
    cancel: Option<CancellationToken>,
}

impl VolumeHandler {
    pub fn new(api: Arc<dyn InstanceApi>, wait: WaitConfig) -> Self {
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
impl ResourceHandler for VolumeHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Volume
    }

    fn bound_zone(&self) -> Option<&str> {
        Some(self.api.zone())
    }

    async fn list(&self, cluster: &str) -> Result<Vec<ResourceHandle>> {
        let volumes = self
            .api
            .list_volumes(&ListFilter::by_tag(cluster_tag(cluster)))
            .await?;
        Ok(volumes.into_iter().map(ResourceHandle::from).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let volumes = self.api.list_volumes(&ListFilter::by_name(name)).await?;
        Ok(exact_name(volumes, name, |v| v.name.as_str())
            .into_iter()
            .map(ResourceHandle::from)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<ResourceHandle> {
        Ok(self.api.get_volume(id).await?.into())
    }

    async fn create(&self, desired: &DesiredResource) -> Result<ResourceHandle> {
        let spec = desired.as_volume()?;
        let volume_type = if spec.volume_type.is_empty() {
            DEFAULT_VOLUME_TYPE.to_string()
        } else {
            spec.volume_type.clone()
        };

        let volume = self
            .api
            .create_volume(&CreateVolumeRequest {
                name: spec.name.clone(),
                size: spec.size,
                volume_type,
                tags: spec.tags.clone(),
            })
            .await?;
        info!(volume = %volume.id, name = %volume.name, "created volume");
        Ok(volume.into())
    }

    async fn update(
        &self,
        handle: &ResourceHandle,
        desired: &DesiredResource,
    ) -> Result<ResourceHandle> {
        let spec = desired.as_volume()?;
        info!(volume = %handle.id, "updating tags");
        Ok(self.api.set_volume_tags(&handle.id, &spec.tags).await?.into())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        let id = handle.id.as_str();
        info!(volume = %id, name = %handle.name, "deleting volume");
        self.api.delete_volume(id).await?;
        wait_until_gone(
            &format!("volume {}", id),
            &self.wait,
            self.cancel.as_ref(),
            || self.api.get_volume(id),
        )
        .await
    }
}
