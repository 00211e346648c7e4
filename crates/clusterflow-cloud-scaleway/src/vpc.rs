//! VPC private networks and public gateways

use crate::client::{ScalewayClient, Target};
use async_trait::async_trait;
use clusterflow_cloud::model::{CreatePrivateNetworkRequest, Gateway, GatewayNetwork, ListFilter, PrivateNetwork};
use clusterflow_cloud::{GatewayApi, ResourceType, Result, VpcApi};
use reqwest::Method;
use serde_json::json;

/// Filters of the VPC products repeat the `tags` parameter per tag
pub(crate) fn repeated_tags_query(filter: &ListFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(name) = &filter.name {
        query.push(("name", name.clone()));
    }
    for tag in &filter.tags {
        query.push(("tags", tag.clone()));
    }
    query
}

const CLEANUP_DHCP: [(&str, &str); 1] = [("cleanup_dhcp", "true")];

#[async_trait]
impl VpcApi for ScalewayClient {
    fn zone(&self) -> &str {
        &self.config().zone
    }

    async fn list_private_networks(&self, filter: &ListFilter) -> Result<Vec<PrivateNetwork>> {
        let mut query = repeated_tags_query(filter);
        query.push(("project_id", self.project_id().to_string()));
        Ok(self
            .list(
                &self.vpc_url("private-networks"),
                "private_networks",
                "page_size",
                &query,
                Target::new(ResourceType::PrivateNetwork, ""),
            )
            .await?)
    }

    async fn get_private_network(&self, id: &str) -> Result<PrivateNetwork> {
        Ok(self
            .get(
                &self.vpc_url(&format!("private-networks/{}", id)),
                Target::new(ResourceType::PrivateNetwork, id),
            )
            .await?)
    }

    async fn create_private_network(
        &self,
        request: &CreatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork> {
        let body = json!({
            "name": request.name,
            "tags": request.tags,
            "subnets": request.subnets,
            "project_id": self.project_id(),
        });
        Ok(self
            .send_json(
                Method::POST,
                &self.vpc_url("private-networks"),
                &body,
                Target::new(ResourceType::PrivateNetwork, &request.name),
            )
            .await?)
    }

    async fn set_private_network_tags(&self, id: &str, tags: &[String]) -> Result<PrivateNetwork> {
        Ok(self
            .send_json(
                Method::PATCH,
                &self.vpc_url(&format!("private-networks/{}", id)),
                &json!({ "tags": tags }),
                Target::new(ResourceType::PrivateNetwork, id),
            )
            .await?)
    }

    async fn delete_private_network(&self, id: &str) -> Result<()> {
        self.delete(
            &self.vpc_url(&format!("private-networks/{}", id)),
            &[],
            Target::new(ResourceType::PrivateNetwork, id),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GatewayApi for ScalewayClient {
    async fn list_gateways(&self, filter: &ListFilter) -> Result<Vec<Gateway>> {
        let mut query = repeated_tags_query(filter);
        query.push(("project_id", self.project_id().to_string()));
        Ok(self
            .list(
                &self.gateway_url("gateways"),
                "gateways",
                "page_size",
                &query,
                Target::new(ResourceType::Gateway, ""),
            )
            .await?)
    }

    async fn get_gateway(&self, id: &str) -> Result<Gateway> {
        Ok(self
            .get(
                &self.gateway_url(&format!("gateways/{}", id)),
                Target::new(ResourceType::Gateway, id),
            )
            .await?)
    }

    async fn delete_gateway(&self, id: &str) -> Result<()> {
        self.delete(
            &self.gateway_url(&format!("gateways/{}", id)),
            &CLEANUP_DHCP,
            Target::new(ResourceType::Gateway, id),
        )
        .await?;
        Ok(())
    }

    async fn list_gateway_networks(&self, gateway_id: &str) -> Result<Vec<GatewayNetwork>> {
        Ok(self
            .list(
                &self.gateway_url("gateway-networks"),
                "gateway_networks",
                "page_size",
                &[("gateway_id", gateway_id.to_string())],
                Target::new(ResourceType::Gateway, gateway_id),
            )
            .await?)
    }

    async fn delete_gateway_network(&self, id: &str) -> Result<()> {
        self.delete(
            &self.gateway_url(&format!("gateway-networks/{}", id)),
            &CLEANUP_DHCP,
            Target::new(ResourceType::Gateway, id),
        )
        .await?;
        Ok(())
    }
}
