//! Instance groups

use crate::desired::{DesiredResource, InstanceSpec};
use crate::diff::Delta;
use crate::error::Result;
use crate::handler::ResourceHandler;
use crate::reconcile::{Found, Task};
use crate::resource::ResourceHandle;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::info;

/// Keeps `count` servers named after the group, all provisioned.
///
/// Extra servers are deleted through the instance handler, newest first.
pub struct InstanceGroupTask {
    handler: Arc<dyn ResourceHandler>,
}

impl InstanceGroupTask {
    pub fn new(handler: Arc<dyn ResourceHandler>) -> Self {
        Self { handler }
    }
}

fn observed(desired: &InstanceSpec, handles: &[ResourceHandle]) -> Option<InstanceSpec> {
    let first = handles.first()?.as_server()?;

    // accept the image by ID or by name
    let image = match &first.image {
        Some(img) if img.id == desired.image || img.name == desired.image => desired.image.clone(),
        Some(img) => img.name.clone(),
        None => String::new(),
    };

    Some(InstanceSpec {
        name: first.name.clone(),
        zone: first.zone.clone(),
        commercial_type: first.commercial_type.clone(),
        image,
        tags: first.tags.clone(),
        count: handles.len(),
        user_data: None,
        private_network: None,
        unprovisioned: handles
            .iter()
            .filter(|h| desired.needs_provisioning(h))
            .count(),
    })
}

#[async_trait]
impl Task for InstanceGroupTask {
    type Spec = InstanceSpec;

    fn bound_zone(&self) -> Option<&str> {
        self.handler.bound_zone()
    }

    async fn find(&self, desired: &InstanceSpec) -> Result<Option<Found<InstanceSpec>>> {
        let handles = self.handler.find_by_name(&desired.name).await?;
        Ok(observed(desired, &handles).map(|state| Found { state, handles }))
    }

    async fn render(
        &self,
        actual: Option<&Found<InstanceSpec>>,
        desired: &InstanceSpec,
        _delta: &Delta,
    ) -> Result<Vec<ResourceHandle>> {
        let wanted = DesiredResource::Instance(desired.clone());

        let mut existing: Vec<ResourceHandle> = actual
            .map(|found| found.handles.clone())
            .unwrap_or_default();
        existing.sort_by_key(|h| Reverse((h.as_server().and_then(|s| s.creation_date), h.id.clone())));

        let excess = existing.len().saturating_sub(desired.count);
        let (doomed, kept) = existing.split_at(excess);

        for handle in doomed {
            info!(group = %desired.name, server = %handle.id, "scaling down");
            self.handler.delete(handle).await?;
        }

        let mut handles = Vec::with_capacity(desired.count);
        for handle in kept {
            if desired.needs_provisioning(handle) {
                handles.push(self.handler.update(handle, &wanted).await?);
            } else {
                handles.push(handle.clone());
            }
        }

        for i in kept.len()..desired.count {
            info!(group = %desired.name, index = i + 1, count = desired.count, "creating server");
            handles.push(self.handler.create(&wanted).await?);
        }

        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use crate::error::CloudError;
    use crate::handlers::InstanceHandler;
    use crate::model::ServerState;
    use crate::reconcile::reconcile;
    use crate::tags::cluster_tag;
    use crate::testing::{FakeCloud, fast_wait};

    const GROUP: &str = "nodes-fr-par-1";

    fn task(cloud: &Arc<FakeCloud>) -> InstanceGroupTask {
        InstanceGroupTask::new(Arc::new(InstanceHandler::new(
            cloud.clone(),
            cloud.clone(),
            fast_wait(),
        )))
    }

    fn group(count: usize, private_network: Option<&str>) -> InstanceSpec {
        InstanceSpec {
            name: GROUP.to_string(),
            zone: "fr-par-1".to_string(),
            commercial_type: "DEV1-M".to_string(),
            image: "ubuntu_jammy".to_string(),
            tags: vec![cluster_tag("demo.example.com")],
            count,
            user_data: None,
            private_network: private_network.map(str::to_string),
            unprovisioned: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scale_down_deletes_newest() {
        let cloud = Arc::new(FakeCloud::new());
        let tags = group(3, None).tags;
        let ids: Vec<String> = (0..5)
            .map(|_| cloud.add_server(GROUP, &tags, ServerState::Running))
            .collect();

        let result = reconcile(&task(&cloud), &group(3, None)).await.unwrap();

        assert_eq!(result.action, ActionType::Update);
        assert_eq!(result.handles.len(), 3);
        assert_eq!(cloud.servers_named(GROUP).len(), 3);
        let mut deleted = cloud.deleted();
        deleted.sort();
        let mut newest = vec![ids[3].clone(), ids[4].clone()];
        newest.sort();
        assert_eq!(deleted, newest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scale_up_from_nothing_then_idempotent() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.add_private_network("demo", &[]);
        let task = task(&cloud);

        let first = reconcile(&task, &group(2, Some("demo"))).await.unwrap();
        assert_eq!(first.action, ActionType::Create);
        assert_eq!(first.handles.len(), 2);
        assert_eq!(first.addresses().len(), 2);
        let calls = cloud.mutations().len();

        let second = reconcile(&task, &group(2, Some("demo"))).await.unwrap();
        assert_eq!(second.action, ActionType::NoOp);
        assert_eq!(cloud.mutations().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_server_is_completed() {
        let cloud = Arc::new(FakeCloud::new());
        let pn = cloud.add_private_network("demo", &[]);
        let tags = group(1, None).tags;
        // created by an interrupted run: tagged, never attached nor started
        let id = cloud.add_server(GROUP, &tags, ServerState::Stopped);

        let result = reconcile(&task(&cloud), &group(1, Some("demo")))
            .await
            .unwrap();

        assert_eq!(result.action, ActionType::Update);
        assert_eq!(result.changed, vec!["unprovisioned"]);
        let server = &cloud.servers_named(GROUP)[0];
        assert_eq!(server.id, id);
        assert!(server.is_attached_to(&pn));
        assert_eq!(server.state, ServerState::Running);
        assert!(!cloud.mutation_ops().contains(&"create_server"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_untagged_root_volume_is_tagged_once() {
        let cloud = Arc::new(FakeCloud::new());
        let tags = group(1, None).tags;
        let id = cloud.add_server(GROUP, &tags, ServerState::Running);
        let root = cloud.root_volume_of(&id);
        let task = task(&cloud);

        let first = reconcile(&task, &group(1, None)).await.unwrap();
        assert_eq!(first.action, ActionType::Update);
        assert_eq!(cloud.mutation_ops(), vec!["set_volume_tags"]);
        assert_eq!(cloud.mutations()[0].target, root);

        let second = reconcile(&task, &group(1, None)).await.unwrap();
        assert_eq!(second.action, ActionType::NoOp);
        assert_eq!(cloud.mutations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_outside_bound_zone_is_not_created() {
        let cloud = Arc::new(FakeCloud::new());
        let mut desired = group(2, None);
        desired.zone = "pl-waw-1".to_string();

        let err = reconcile(&task(&cloud), &desired).await.unwrap_err();

        assert!(matches!(err, CloudError::InvalidDesiredState(_)), "{err}");
        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commercial_type_change_is_rejected() {
        let cloud = Arc::new(FakeCloud::new());
        let tags = group(1, None).tags;
        cloud.add_server(GROUP, &tags, ServerState::Running);
        let mut desired = group(1, None);
        desired.commercial_type = "GP1-S".to_string();

        let err = reconcile(&task(&cloud), &desired).await.unwrap_err();

        assert!(err.to_string().contains("commercial_type"));
        assert!(cloud.mutations().is_empty());
    }
}
