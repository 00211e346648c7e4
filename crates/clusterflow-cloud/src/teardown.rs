//! Dependency-ordered deletion of a cluster's inventory
//!
//! Each pass deletes every descriptor whose blocker types have no live
//! resource left, then continues on the inventory without them. A pass that
//! finds nothing deletable while resources remain ends the run with
//! [`CloudError::TeardownStuck`].

use crate::action::{Action, ActionType, Plan};
use crate::error::{CloudError, Result, StuckReport, StuckResource};
use crate::handler::HandlerRegistry;
use crate::inventory::{Inventory, ResourceDescriptor};
use crate::resource::ResourceType;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
pub struct TeardownConfig {
    /// Deletions running at once within a pass
    pub concurrency: usize,
    /// Report the passes without deleting anything
    pub dry_run: bool,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedResource {
    pub resource_type: ResourceType,
    pub id: String,
    pub name: String,
}

impl From<&ResourceDescriptor> for DeletedResource {
    fn from(d: &ResourceDescriptor) -> Self {
        Self {
            resource_type: d.resource_type,
            id: d.id.clone(),
            name: d.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    /// Resources deleted in each pass, in pass order
    pub passes: Vec<Vec<DeletedResource>>,
    pub dry_run: bool,
}

impl TeardownReport {
    pub fn deleted(&self) -> impl Iterator<Item = &DeletedResource> {
        self.passes.iter().flatten()
    }

    pub fn deleted_count(&self) -> usize {
        self.passes.iter().map(Vec::len).sum()
    }

    pub fn to_plan(&self) -> Plan {
        let actions = self
            .passes
            .iter()
            .enumerate()
            .flat_map(|(pass, resources)| {
                resources.iter().map(move |r| {
                    Action::new(
                        ActionType::Delete,
                        r.resource_type,
                        r.id.clone(),
                        format!("delete {} {} ({})", r.resource_type, r.name, r.id),
                    )
                    .with_detail("pass", json!(pass + 1))
                })
            })
            .collect();
        Plan::new(actions)
    }
}

pub struct TeardownScheduler {
    registry: HandlerRegistry,
    config: TeardownConfig,
}

impl TeardownScheduler {
    pub fn new(registry: HandlerRegistry, config: TeardownConfig) -> Self {
        Self { registry, config }
    }

    /// Split an inventory into what may be deleted now and what is blocked
    pub fn partition(inventory: &Inventory) -> (Vec<&ResourceDescriptor>, Vec<StuckResource>) {
        let mut ready = Vec::new();
        let mut blocked = Vec::new();
        for descriptor in inventory.iter() {
            let blockers = inventory.blockers(descriptor);
            if blockers.is_empty() {
                ready.push(descriptor);
            } else {
                blocked.push(StuckResource {
                    resource_type: descriptor.resource_type,
                    id: descriptor.id.clone(),
                    name: descriptor.name.clone(),
                    unresolved: blockers,
                });
            }
        }
        (ready, blocked)
    }

    pub async fn run(
        &self,
        inventory: Inventory,
        cancel: Option<&CancellationToken>,
    ) -> Result<TeardownReport> {
        let mut report = TeardownReport {
            passes: Vec::new(),
            dry_run: self.config.dry_run,
        };
        let mut inventory = inventory;

        while !inventory.is_empty() {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                return Err(CloudError::Cancelled(format!(
                    "tearing down {} resources",
                    inventory.len()
                )));
            }

            let (ready, blocked) = Self::partition(&inventory);
            if ready.is_empty() {
                error!(remaining = blocked.len(), "teardown is stuck");
                return Err(CloudError::TeardownStuck(StuckReport { remaining: blocked }));
            }

            let pass = report.passes.len() + 1;
            info!(
                pass,
                deleting = ready.len(),
                blocked = blocked.len(),
                dry_run = self.config.dry_run,
                "teardown pass"
            );

            let deleted: Vec<DeletedResource> = if self.config.dry_run {
                ready.iter().map(|d| DeletedResource::from(*d)).collect()
            } else {
                self.delete_all(&ready, cancel).await?
            };

            let keys: Vec<String> = ready.iter().map(|d| d.key()).collect();
            inventory = inventory.without(keys.iter().map(String::as_str));
            report.passes.push(deleted);
        }

        info!(
            passes = report.passes.len(),
            deleted = report.deleted_count(),
            "teardown finished"
        );
        Ok(report)
    }

    async fn delete_all(
        &self,
        ready: &[&ResourceDescriptor],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<DeletedResource>> {
        let results: Vec<Result<DeletedResource>> = stream::iter(
            ready
                .iter()
                .map(|descriptor| self.delete_one(descriptor, cancel)),
        )
        .buffer_unordered(self.config.concurrency.max(1))
        .collect()
        .await;

        let mut deleted = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(resource) => deleted.push(resource),
                Err(e) => {
                    error!(error = %e, "deletion failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    async fn delete_one(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<DeletedResource> {
        let handler = self.registry.get(descriptor.resource_type)?;
        let deletion = handler.delete(&descriptor.handle);

        let outcome = match cancel {
            Some(token) => tokio::select! {
                result = deletion => result,
                _ = token.cancelled() => Err(CloudError::Cancelled(format!(
                    "deleting {}",
                    descriptor.key()
                ))),
            },
            None => deletion.await,
        };

        match outcome {
            Ok(()) => info!(resource = %descriptor.key(), name = %descriptor.name, "deleted"),
            Err(e) if e.is_not_found() => {
                debug!(resource = %descriptor.key(), "already gone")
            }
            Err(e) => return Err(e),
        }
        Ok(DeletedResource::from(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CloudApis;
    use crate::inventory::{DependencyTable, InventoryBuilder};
    use crate::model::ServerState;
    use crate::tags::{cluster_tag, load_balancer_name};
    use crate::testing::{FakeCloud, fast_wait};
    use std::sync::Arc;

    const CLUSTER: &str = "demo.example.com";

    fn tags() -> Vec<String> {
        vec![cluster_tag(CLUSTER)]
    }

    fn registry(cloud: &Arc<FakeCloud>) -> HandlerRegistry {
        let apis = CloudApis::from_client(cloud.clone());
        HandlerRegistry::standard(&apis, Some("example.com"), fast_wait())
    }

    async fn inventory(cloud: &Arc<FakeCloud>) -> Inventory {
        InventoryBuilder::new(&registry(cloud))
            .build(CLUSTER)
            .await
            .unwrap()
    }

    fn scheduler(cloud: &Arc<FakeCloud>, dry_run: bool) -> TeardownScheduler {
        TeardownScheduler::new(
            registry(cloud),
            TeardownConfig {
                concurrency: 4,
                dry_run,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_instance_before_its_volume() {
        let cloud = Arc::new(FakeCloud::new());
        let srv = cloud.add_server("nodes", &tags(), ServerState::Running);
        let vol = cloud.add_volume("etcd-main", &tags());
        cloud.attach_volume(&vol, &srv);

        let report = scheduler(&cloud, false)
            .run(inventory(&cloud).await, None)
            .await
            .unwrap();

        assert_eq!(cloud.deleted(), vec![srv.clone(), vol.clone()]);
        assert_eq!(report.passes.len(), 2);
        assert_eq!(report.passes[0][0].id, srv);
        assert_eq!(report.passes[1][0].id, vol);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_before_its_private_network() {
        let cloud = Arc::new(FakeCloud::new());
        let pn = cloud.add_private_network("demo", &tags());
        let gw = cloud.add_gateway("demo-gw", &tags(), Some(&pn));

        scheduler(&cloud, false)
            .run(inventory(&cloud).await, None)
            .await
            .unwrap();

        assert_eq!(cloud.deleted(), vec![gw, pn]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_is_reported_as_stuck() {
        let cloud = Arc::new(FakeCloud::new());
        let srv = cloud.add_server("nodes", &tags(), ServerState::Running);
        let vol = cloud.add_volume("etcd-main", &tags());
        let table = DependencyTable::default().with_edge(ResourceType::Volume, ResourceType::Instance);
        let reg = registry(&cloud);
        let inventory = InventoryBuilder::new(&reg)
            .with_table(table)
            .build(CLUSTER)
            .await
            .unwrap();

        let err = scheduler(&cloud, false).run(inventory, None).await.unwrap_err();

        match err {
            CloudError::TeardownStuck(report) => {
                let mut ids = report.ids();
                ids.sort();
                let mut expected = vec![srv.as_str(), vol.as_str()];
                expected.sort();
                assert_eq!(ids, expected);
                assert!(report.remaining.iter().all(|r| r.unresolved.len() == 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cloud.deleted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cluster_respects_dependencies() {
        let cloud = Arc::new(FakeCloud::new());
        let pn = cloud.add_private_network("demo", &tags());
        cloud.add_gateway("demo-gw", &tags(), Some(&pn));
        let srv = cloud.add_server("control-plane", &tags(), ServerState::Running);
        cloud.attach_nic(&srv, &pn);
        let vol = cloud.add_volume("etcd-main", &tags());
        cloud.attach_volume(&vol, &srv);
        cloud.add_load_balancer(&load_balancer_name(CLUSTER), &[]);
        cloud.add_record("example.com", "api.demo", "A", "51.159.0.1");

        let report = scheduler(&cloud, false)
            .run(inventory(&cloud).await, None)
            .await
            .unwrap();

        assert_eq!(report.deleted_count(), 6);
        assert_eq!(report.passes.len(), 2);
        let last: Vec<ResourceType> = report.passes[1].iter().map(|r| r.resource_type).collect();
        assert!(last.contains(&ResourceType::Volume));
        assert!(last.contains(&ResourceType::PrivateNetwork));
        assert!(!cloud.exists(&pn));
        assert!(!cloud.exists(&vol));
        assert_eq!(cloud.released_ips().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_gone_counts_as_deleted() {
        let cloud = Arc::new(FakeCloud::new());
        let vol = cloud.add_volume("etcd-main", &tags());
        let inventory = inventory(&cloud).await;
        cloud.remove(&vol);

        let report = scheduler(&cloud, false).run(inventory, None).await.unwrap();

        assert_eq!(report.deleted_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_deletes_nothing() {
        let cloud = Arc::new(FakeCloud::new());
        let srv = cloud.add_server("nodes", &tags(), ServerState::Running);
        let vol = cloud.add_volume("etcd-main", &tags());
        cloud.attach_volume(&vol, &srv);

        let report = scheduler(&cloud, true)
            .run(inventory(&cloud).await, None)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.passes.len(), 2);
        assert!(cloud.mutations().is_empty());

        let plan = report.to_plan();
        assert_eq!(plan.summary().delete, 2);
        assert_eq!(plan.actions[0].id, format!("instance:{}", srv));
        assert_eq!(plan.actions[1].details["pass"], json!(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_pass() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.add_volume("etcd-main", &tags());
        let token = CancellationToken::new();
        token.cancel();

        let err = scheduler(&cloud, false)
            .run(inventory(&cloud).await, Some(&token))
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Cancelled(_)));
        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_empty_inventory() {
        let cloud = Arc::new(FakeCloud::new());

        let report = scheduler(&cloud, false)
            .run(Inventory::new(), None)
            .await
            .unwrap();

        assert!(report.passes.is_empty());
    }
}
