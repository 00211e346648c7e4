//! Load balancers (regional)

use crate::client::{ScalewayClient, Target};
use crate::vpc::repeated_tags_query;
use async_trait::async_trait;
use clusterflow_cloud::model::{CreateLoadBalancerRequest, ListFilter, LoadBalancer};
use clusterflow_cloud::{LbApi, ResourceType, Result};
use reqwest::Method;
use serde_json::json;

#[async_trait]
impl LbApi for ScalewayClient {
    async fn list_load_balancers(&self, filter: &ListFilter) -> Result<Vec<LoadBalancer>> {
        let mut query = repeated_tags_query(filter);
        query.push(("project_id", self.project_id().to_string()));
        Ok(self
            .list(
                &self.lb_url("lbs"),
                "lbs",
                "page_size",
                &query,
                Target::new(ResourceType::LoadBalancer, ""),
            )
            .await?)
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer> {
        Ok(self
            .get(
                &self.lb_url(&format!("lbs/{}", id)),
                Target::new(ResourceType::LoadBalancer, id),
            )
            .await?)
    }

    async fn create_load_balancer(
        &self,
        request: &CreateLoadBalancerRequest,
    ) -> Result<LoadBalancer> {
        let body = json!({
            "name": request.name,
            "description": "",
            "type": request.lb_type,
            "tags": request.tags,
            "project_id": self.project_id(),
        });
        Ok(self
            .send_json(
                Method::POST,
                &self.lb_url("lbs"),
                &body,
                Target::new(ResourceType::LoadBalancer, &request.name),
            )
            .await?)
    }

    /// The update endpoint replaces the name too, so the current one is
    /// sent back.
    async fn set_load_balancer_tags(&self, id: &str, tags: &[String]) -> Result<LoadBalancer> {
        let current = self.get_load_balancer(id).await?;
        let body = json!({
            "name": current.name,
            "description": "",
            "tags": tags,
        });
        Ok(self
            .send_json(
                Method::PUT,
                &self.lb_url(&format!("lbs/{}", id)),
                &body,
                Target::new(ResourceType::LoadBalancer, id),
            )
            .await?)
    }

    async fn delete_load_balancer(&self, id: &str, release_ip: bool) -> Result<()> {
        let release = if release_ip { "true" } else { "false" };
        self.delete(
            &self.lb_url(&format!("lbs/{}", id)),
            &[("release_ip", release)],
            Target::new(ResourceType::LoadBalancer, id),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_load_balancer_addresses() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lb/v1/regions/fr-par/lbs/lb-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "lb-1",
                "name": "api-demo-example-com",
                "region": "fr-par",
                "status": "ready",
                "type": "LB-S",
                "tags": [],
                "ip": [{ "id": "ip-1", "ip_address": "51.159.0.10" }]
            })))
            .mount(&mock_server)
            .await;
        let client = ScalewayClient::new(config(&mock_server.uri())).unwrap();

        let lb = client.get_load_balancer("lb-1").await.unwrap();

        assert_eq!(lb.lb_type, "LB-S");
        assert_eq!(lb.addresses(), vec!["51.159.0.10".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_releases_ip() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/lb/v1/regions/fr-par/lbs/lb-1"))
            .and(query_param("release_ip", "true"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;
        let client = ScalewayClient::new(config(&mock_server.uri())).unwrap();

        client.delete_load_balancer("lb-1", true).await.unwrap();
    }
}
