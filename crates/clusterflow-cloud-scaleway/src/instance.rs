//! Instance API: servers, volumes and private NICs

use crate::client::{ScalewayClient, Target};
use async_trait::async_trait;
use clusterflow_cloud::model::{
    CreateServerRequest, CreateVolumeRequest, ListFilter, PrivateNic, Server, ServerAction,
    Volume,
};
use clusterflow_cloud::{InstanceApi, ResourceType, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct ServerEnvelope {
    server: Server,
}

#[derive(Deserialize)]
struct VolumeEnvelope {
    volume: Volume,
}

#[derive(Deserialize)]
struct PrivateNicEnvelope {
    private_nic: PrivateNic,
}

/// Instance list filters take tags as one comma-separated value
fn instance_query(filter: &ListFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(name) = &filter.name {
        query.push(("name", name.clone()));
    }
    if !filter.tags.is_empty() {
        query.push(("tags", filter.tags.join(",")));
    }
    query
}

#[async_trait]
impl InstanceApi for ScalewayClient {
    fn zone(&self) -> &str {
        &self.config().zone
    }

    async fn list_servers(&self, filter: &ListFilter) -> Result<Vec<Server>> {
        Ok(self
            .list(
                &self.instance_url("servers"),
                "servers",
                "per_page",
                &instance_query(filter),
                Target::new(ResourceType::Instance, ""),
            )
            .await?)
    }

    async fn get_server(&self, id: &str) -> Result<Server> {
        let envelope: ServerEnvelope = self
            .get(
                &self.instance_url(&format!("servers/{}", id)),
                Target::new(ResourceType::Instance, id),
            )
            .await?;
        Ok(envelope.server)
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server> {
        let body = json!({
            "name": request.name,
            "commercial_type": request.commercial_type,
            "image": request.image,
            "tags": request.tags,
            "project": self.project_id(),
        });
        let envelope: ServerEnvelope = self
            .send_json(
                Method::POST,
                &self.instance_url("servers"),
                &body,
                Target::new(ResourceType::Instance, &request.name),
            )
            .await?;
        Ok(envelope.server)
    }

    async fn server_action(&self, id: &str, action: ServerAction) -> Result<()> {
        let _task: serde_json::Value = self
            .send_json(
                Method::POST,
                &self.instance_url(&format!("servers/{}/action", id)),
                &json!({ "action": action }),
                Target::new(ResourceType::Instance, id),
            )
            .await?;
        Ok(())
    }

    async fn set_server_tags(&self, id: &str, tags: &[String]) -> Result<Server> {
        let envelope: ServerEnvelope = self
            .send_json(
                Method::PATCH,
                &self.instance_url(&format!("servers/{}", id)),
                &json!({ "tags": tags }),
                Target::new(ResourceType::Instance, id),
            )
            .await?;
        Ok(envelope.server)
    }

    async fn set_user_data(&self, id: &str, key: &str, content: &str) -> Result<()> {
        self.send_text(
            Method::PATCH,
            &self.instance_url(&format!("servers/{}/user_data/{}", id, key)),
            content,
            Target::new(ResourceType::Instance, id),
        )
        .await?;
        Ok(())
    }

    async fn create_private_nic(
        &self,
        server_id: &str,
        private_network_id: &str,
    ) -> Result<PrivateNic> {
        let envelope: PrivateNicEnvelope = self
            .send_json(
                Method::POST,
                &self.instance_url(&format!("servers/{}/private_nics", server_id)),
                &json!({ "private_network_id": private_network_id }),
                Target::new(ResourceType::Instance, server_id),
            )
            .await?;
        Ok(envelope.private_nic)
    }

    async fn delete_server(&self, id: &str) -> Result<()> {
        self.delete(
            &self.instance_url(&format!("servers/{}", id)),
            &[],
            Target::new(ResourceType::Instance, id),
        )
        .await?;
        Ok(())
    }

    async fn list_volumes(&self, filter: &ListFilter) -> Result<Vec<Volume>> {
        Ok(self
            .list(
                &self.instance_url("volumes"),
                "volumes",
                "per_page",
                &instance_query(filter),
                Target::new(ResourceType::Volume, ""),
            )
            .await?)
    }

    async fn get_volume(&self, id: &str) -> Result<Volume> {
        let envelope: VolumeEnvelope = self
            .get(
                &self.instance_url(&format!("volumes/{}", id)),
                Target::new(ResourceType::Volume, id),
            )
            .await?;
        Ok(envelope.volume)
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume> {
        let body = json!({
            "name": request.name,
            "size": request.size,
            "volume_type": request.volume_type,
            "tags": request.tags,
            "project": self.project_id(),
        });
        let envelope: VolumeEnvelope = self
            .send_json(
                Method::POST,
                &self.instance_url("volumes"),
                &body,
                Target::new(ResourceType::Volume, &request.name),
            )
            .await?;
        Ok(envelope.volume)
    }

    async fn set_volume_tags(&self, id: &str, tags: &[String]) -> Result<Volume> {
        let envelope: VolumeEnvelope = self
            .send_json(
                Method::PATCH,
                &self.instance_url(&format!("volumes/{}", id)),
                &json!({ "tags": tags }),
                Target::new(ResourceType::Volume, id),
            )
            .await?;
        Ok(envelope.volume)
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        self.delete(
            &self.instance_url(&format!("volumes/{}", id)),
            &[],
            Target::new(ResourceType::Volume, id),
        )
        .await?;
        Ok(())
    }
}
