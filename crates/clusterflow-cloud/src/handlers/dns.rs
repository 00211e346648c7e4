//! DNS records
//!
//! A record belongs to a cluster when its fully-qualified name is a strict
//! subdomain of the cluster name: in zone `example.com`, cluster
//! `demo.example.com` owns `api.demo` and `api.internal.demo` but not `demo`
//! or `www`. Clusters outside the zone own nothing.

use crate::api::DomainApi;
use crate::desired::DesiredResource;
use crate::error::{CloudError, Result};
use crate::handler::ResourceHandler;
use crate::model::CreateDnsRecordRequest;
use crate::resource::{ResourceHandle, ResourceType};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Suffix of gossip-based clusters, which have no DNS zone
pub const GOSSIP_SUFFIX: &str = ".k8s.local";

/// Zone a cluster's records live in when none is configured
pub fn default_zone(cluster: &str) -> Option<String> {
    if cluster.ends_with(GOSSIP_SUFFIX) {
        return None;
    }
    cluster
        .split_once('.')
        .map(|(_, zone)| zone)
        .filter(|zone| zone.contains('.'))
        .map(str::to_string)
}

/// Fully-qualified name of a zone-relative record name
pub fn fqdn(name: &str, zone: &str) -> String {
    if name.is_empty() || name == "@" {
        zone.to_string()
    } else {
        format!("{}.{}", name, zone)
    }
}

pub fn is_owned_by(cluster: &str, zone: &str, record_name: &str) -> bool {
    let inside_zone = cluster == zone || cluster.ends_with(&format!(".{}", zone));
    inside_zone && fqdn(record_name, zone).ends_with(&format!(".{}", cluster))
}

pub struct DnsRecordHandler {
    api: Arc<dyn DomainApi>,
    zone: String,
}

impl DnsRecordHandler {
    pub fn new(api: Arc<dyn DomainApi>, zone: impl Into<String>) -> Self {
        Self {
            api,
            zone: zone.into(),
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }
}

#[async_trait]
impl ResourceHandler for DnsRecordHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::DnsRecord
    }

    async fn list(&self, cluster: &str) -> Result<Vec<ResourceHandle>> {
        let records = self.api.list_records(&self.zone).await?;
        Ok(records
            .into_iter()
            .filter(|r| is_owned_by(cluster, &self.zone, &r.name))
            .map(ResourceHandle::from)
            .collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let records = self.api.list_records(&self.zone).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.name == name)
            .map(ResourceHandle::from)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<ResourceHandle> {
        let records = self.api.list_records(&self.zone).await?;
        records
            .into_iter()
            .find(|r| r.id == id)
            .map(ResourceHandle::from)
            .ok_or_else(|| CloudError::not_found(ResourceType::DnsRecord, id))
    }

    async fn create(&self, desired: &DesiredResource) -> Result<ResourceHandle> {
        let spec = desired.as_dns_record()?;
        let record = self
            .api
            .create_record(
                &self.zone,
                &CreateDnsRecordRequest {
                    name: spec.name.clone(),
                    record_type: spec.record_type.clone(),
                    data: spec.data.clone(),
                    ttl: spec.ttl,
                },
            )
            .await?;
        info!(record = %fqdn(&record.name, &self.zone), data = %record.data, "created DNS record");
        Ok(record.into())
    }

    async fn update(
        &self,
        handle: &ResourceHandle,
        desired: &DesiredResource,
    ) -> Result<ResourceHandle> {
        let spec = desired.as_dns_record()?;
        let record = self
            .api
            .update_record(&self.zone, &handle.id, &spec.data, spec.ttl)
            .await?;
        info!(record = %fqdn(&record.name, &self.zone), data = %record.data, "updated DNS record");
        Ok(record.into())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        info!(record = %fqdn(&handle.name, &self.zone), "deleting DNS record");
        self.api.delete_record(&self.zone, &handle.id).await
    }
}
