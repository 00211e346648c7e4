//! DNS zone records
//!
//! Records are changed through one PATCH endpoint taking a list of
//! `add`/`set`/`delete` changes.

use crate::client::{ScalewayClient, Target};
use crate::error::ScalewayError;
use async_trait::async_trait;
use clusterflow_cloud::model::{CreateDnsRecordRequest, DnsRecord};
use clusterflow_cloud::{CloudError, DomainApi, ResourceType, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<DnsRecord>,
}

impl ScalewayClient {
    async fn patch_records(
        &self,
        zone: &str,
        change: Value,
        target: Target<'_>,
    ) -> std::result::Result<Vec<DnsRecord>, ScalewayError> {
        let body = json!({
            "changes": [change],
            "return_all_records": false,
        });
        let response: RecordsResponse = self
            .send_json(Method::PATCH, &self.domain_url(zone, "records"), &body, target)
            .await?;
        Ok(response.records)
    }
}

fn first_record(records: Vec<DnsRecord>, what: &str) -> std::result::Result<DnsRecord, ScalewayError> {
    records
        .into_iter()
        .next()
        .ok_or_else(|| ScalewayError::UnexpectedResponse(format!("no record returned for {}", what)))
}

#[async_trait]
impl DomainApi for ScalewayClient {
    async fn list_records(&self, zone: &str) -> Result<Vec<DnsRecord>> {
        Ok(self
            .list(
                &self.domain_url(zone, "records"),
                "records",
                "page_size",
                &[],
                Target::new(ResourceType::DnsRecord, zone),
            )
            .await?)
    }

    async fn create_record(&self, zone: &str, request: &CreateDnsRecordRequest) -> Result<DnsRecord> {
        let change = json!({ "add": { "records": [request] } });
        let records = self
            .patch_records(zone, change, Target::new(ResourceType::DnsRecord, &request.name))
            .await?;
        Ok(first_record(records, &request.name)?)
    }

    async fn update_record(&self, zone: &str, id: &str, data: &str, ttl: u32) -> Result<DnsRecord> {
        let current = self
            .list_records(zone)
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| CloudError::not_found(ResourceType::DnsRecord, id))?;

        let change = json!({
            "set": {
                "id": id,
                "records": [{
                    "name": current.name,
                    "type": current.record_type,
                    "data": data,
                    "ttl": ttl,
                }],
            }
        });
        let records = self
            .patch_records(zone, change, Target::new(ResourceType::DnsRecord, id))
            .await?;
        Ok(first_record(records, id)?)
    }

    async fn delete_record(&self, zone: &str, id: &str) -> Result<()> {
        let change = json!({ "delete": { "id": id } });
        self.patch_records(zone, change, Target::new(ResourceType::DnsRecord, id))
            .await?;
        Ok(())
    }
}
