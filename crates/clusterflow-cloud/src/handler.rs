//! Resource handler contract and registry

use crate::api::CloudApis;
use crate::desired::DesiredResource;
use crate::error::{CloudError, Result};
use crate::handlers::{
    DnsRecordHandler, GatewayHandler, InstanceHandler, LoadBalancerHandler,
    PrivateNetworkHandler, VolumeHandler,
};
use crate::resource::{ResourceHandle, ResourceType};
use crate::wait::WaitConfig;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// CRUD surface of one resource type
///
/// Handlers are the only components that talk to the cloud. Lookups that
/// find nothing return an empty list; `get` of a missing ID returns
/// `CloudError::NotFound`.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    /// Zone new resources of this type land in, for zoned types
    fn bound_zone(&self) -> Option<&str> {
        None
    }

    /// Every resource of this type that belongs to the cluster
    async fn list(&self, cluster: &str) -> Result<Vec<ResourceHandle>>;

    /// Resources whose name is exactly `name`
    async fn find_by_name(&self, name: &str) -> Result<Vec<ResourceHandle>>;

    async fn get(&self, id: &str) -> Result<ResourceHandle>;

    async fn create(&self, desired: &DesiredResource) -> Result<ResourceHandle>;

    /// Apply the mutable fields of `desired` to an existing resource
    async fn update(
        &self,
        handle: &ResourceHandle,
        desired: &DesiredResource,
    ) -> Result<ResourceHandle> {
        let _ = (handle, desired);
        Err(CloudError::unsupported(self.resource_type(), "update"))
    }

    /// Delete and wait until the resource is gone
    async fn delete(&self, handle: &ResourceHandle) -> Result<()>;
}

/// Handlers keyed by resource type
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<ResourceType, Arc<dyn ResourceHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every built-in handler on top of `apis`.
    ///
    /// DNS records are only handled when a zone is known.
    pub fn standard(apis: &CloudApis, dns_zone: Option<&str>, wait: WaitConfig) -> Self {
        Self::standard_with_cancel(apis, dns_zone, wait, None)
    }

    /// Like [`HandlerRegistry::standard`], with every wait stopping once
    /// `cancel` fires
    pub fn standard_with_cancel(
        apis: &CloudApis,
        dns_zone: Option<&str>,
        wait: WaitConfig,
        cancel: Option<CancellationToken>,
    ) -> Self {
        let mut instance = InstanceHandler::new(apis.instance.clone(), apis.vpc.clone(), wait);
        let mut volume = VolumeHandler::new(apis.instance.clone(), wait);
        let mut network = PrivateNetworkHandler::new(apis.vpc.clone(), wait);
        let mut gateway = GatewayHandler::new(apis.gateway.clone(), wait);
        let mut lb = LoadBalancerHandler::new(apis.lb.clone(), wait);
        if let Some(token) = cancel {
            instance = instance.with_cancel(token.clone());
            volume = volume.with_cancel(token.clone());
            network = network.with_cancel(token.clone());
            gateway = gateway.with_cancel(token.clone());
            lb = lb.with_cancel(token);
        }

        let mut registry = Self::new();
        registry.register(Arc::new(instance));
        registry.register(Arc::new(volume));
        registry.register(Arc::new(network));
        registry.register(Arc::new(gateway));
        registry.register(Arc::new(lb));
        if let Some(zone) = dns_zone {
            registry.register(Arc::new(DnsRecordHandler::new(apis.domain.clone(), zone)));
        }
        registry
    }

    /// Register a handler, replacing any previous one for the same type
    pub fn register(&mut self, handler: Arc<dyn ResourceHandler>) {
        self.handlers.insert(handler.resource_type(), handler);
    }

    pub fn get(&self, resource_type: ResourceType) -> Result<Arc<dyn ResourceHandler>> {
        self.handlers
            .get(&resource_type)
            .cloned()
            .ok_or(CloudError::HandlerNotRegistered(resource_type))
    }

    pub fn contains(&self, resource_type: ResourceType) -> bool {
        self.handlers.contains_key(&resource_type)
    }

    /// Registered handlers in `ResourceType::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ResourceHandler>> {
        ResourceType::ALL
            .into_iter()
            .filter_map(move |t| self.handlers.get(&t))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
