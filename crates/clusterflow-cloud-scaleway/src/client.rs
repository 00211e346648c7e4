//! HTTP client for the Scaleway API
//!
//! Authenticates every request with the `X-Auth-Token` header and turns
//! error statuses into [`ScalewayError`]. Capability traits are implemented
//! in the per-product modules.

use crate::error::{Result, ScalewayError};
use clusterflow_cloud::ResourceType;
use clusterflow_config::ScalewayConfig;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const AUTH_HEADER: &str = "X-Auth-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const PAGE_SIZE: usize = 100;

/// Resource a request is about, used to report 404s
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target<'a> {
    pub resource_type: ResourceType,
    pub id: &'a str,
}

impl<'a> Target<'a> {
    pub fn new(resource_type: ResourceType, id: &'a str) -> Self {
        Self { resource_type, id }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Scaleway API client for one project and zone
#[derive(Clone)]
pub struct ScalewayClient {
    http: reqwest::Client,
    config: ScalewayConfig,
}

impl ScalewayClient {
    pub fn new(config: ScalewayConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&config.secret_key)
            .map_err(|_| ScalewayError::InvalidConfig("secret key is not a valid header value".into()))?;
        token.set_sensitive(true);
        headers.insert(AUTH_HEADER, token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("clusterflow/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ScalewayConfig {
        &self.config
    }

    pub(crate) fn project_id(&self) -> &str {
        &self.config.project_id
    }

    pub(crate) fn instance_url(&self, path: &str) -> String {
        format!(
            "{}/instance/v1/zones/{}/{}",
            self.config.api_url, self.config.zone, path
        )
    }

    pub(crate) fn vpc_url(&self, path: &str) -> String {
        format!(
            "{}/vpc/v1/zones/{}/{}",
            self.config.api_url, self.config.zone, path
        )
    }

    pub(crate) fn gateway_url(&self, path: &str) -> String {
        format!(
            "{}/vpc-gw/v1/zones/{}/{}",
            self.config.api_url, self.config.zone, path
        )
    }

    pub(crate) fn lb_url(&self, path: &str) -> String {
        format!(
            "{}/lb/v1/regions/{}/{}",
            self.config.api_url, self.config.region, path
        )
    }

    pub(crate) fn domain_url(&self, zone: &str, path: &str) -> String {
        format!(
            "{}/domain/v2beta1/dns-zones/{}/{}",
            self.config.api_url, zone, path
        )
    }

    async fn execute(&self, request: RequestBuilder, target: Target<'_>) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ScalewayError::NotFound {
                resource_type: target.resource_type,
                id: target.id.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        debug!(status = status.as_u16(), %message, "Scaleway API error");
        Err(ScalewayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str, target: Target<'_>) -> Result<T> {
        debug!(url, "GET");
        let response = self.execute(self.http.get(url), target).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &serde_json::Value,
        target: Target<'_>,
    ) -> Result<T> {
        debug!(url, %method, "sending");
        let response = self
            .execute(self.http.request(method, url).json(body), target)
            .await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn send_text(
        &self,
        method: Method,
        url: &str,
        body: &str,
        target: Target<'_>,
    ) -> Result<()> {
        debug!(url, %method, "sending text");
        let request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "text/plain")
            .body(body.to_string());
        self.execute(request, target).await?;
        Ok(())
    }

    pub(crate) async fn delete(
        &self,
        url: &str,
        query: &[(&str, &str)],
        target: Target<'_>,
    ) -> Result<()> {
        debug!(url, "DELETE");
        self.execute(self.http.delete(url).query(query), target)
            .await?;
        Ok(())
    }

    /// Fetch every page of a list endpoint.
    ///
    /// Items are read from the `key` array. The total comes from
    /// `total_count` in the body or the `X-Total-Count` header.
    pub(crate) async fn list<T: DeserializeOwned>(
        &self,
        url: &str,
        key: &str,
        page_size_param: &str,
        query: &[(&str, String)],
        target: Target<'_>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let request = self.http.get(url).query(query).query(&[
                ("page", page.to_string()),
                (page_size_param, PAGE_SIZE.to_string()),
            ]);
            let response = self.execute(request, target).await?;
            let header_total = response
                .headers()
                .get("x-total-count")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());

            let mut body: serde_json::Value = response.json().await?;
            let total = body
                .get("total_count")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .or(header_total);
            let batch: Vec<T> = match body.get_mut(key) {
                Some(value) => serde_json::from_value(value.take())?,
                None => {
                    return Err(ScalewayError::UnexpectedResponse(format!(
                        "list response has no {} field",
                        key
                    )));
                }
            };

            let fetched = batch.len();
            items.extend(batch);
            debug!(url, page, fetched, total = ?total, "listed page");

            let more = match total {
                Some(total) => items.len() < total && fetched > 0,
                None => fetched == PAGE_SIZE,
            };
            if !more {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}
