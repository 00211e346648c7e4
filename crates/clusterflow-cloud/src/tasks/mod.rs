//! Reconcile tasks
//!
//! Single-object resources share [`ResourceTask`]; instance groups have
//! their own task because one desired value maps to many servers.

pub mod instance;

pub use instance::InstanceGroupTask;

use crate::desired::ObservedSpec;
use crate::diff::Delta;
use crate::error::{CloudError, Result};
use crate::handler::ResourceHandler;
use crate::reconcile::{Found, Task};
use crate::resource::ResourceHandle;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// Reconciles a resource identified by its unique name
pub struct ResourceTask<S> {
    handler: Arc<dyn ResourceHandler>,
    _spec: PhantomData<fn() -> S>,
}

impl<S: ObservedSpec> ResourceTask<S> {
    pub fn new(handler: Arc<dyn ResourceHandler>) -> Self {
        Self {
            handler,
            _spec: PhantomData,
        }
    }
}

#[async_trait]
impl<S: ObservedSpec + 'static> Task for ResourceTask<S> {
    type Spec = S;

    fn bound_zone(&self) -> Option<&str> {
        self.handler.bound_zone()
    }

    async fn find(&self, desired: &S) -> Result<Option<Found<S>>> {
        let mut matching = Vec::new();
        for handle in self.handler.find_by_name(desired.name()).await? {
            let state = S::from_handle(&handle).ok_or_else(|| {
                CloudError::ApiError(format!(
                    "{} does not hold a {}",
                    handle.key(),
                    desired.resource_type()
                ))
            })?;
            if state.same_key(desired) {
                matching.push((state, handle));
            }
        }

        if matching.len() > 1 {
            warn!(
                resource_type = %desired.resource_type(),
                name = %desired.name(),
                count = matching.len(),
                "several resources share this name, using the first"
            );
        }
        Ok(matching.into_iter().next().map(|(state, handle)| Found {
            state,
            handles: vec![handle],
        }))
    }

    async fn render(
        &self,
        actual: Option<&Found<S>>,
        desired: &S,
        _delta: &Delta,
    ) -> Result<Vec<ResourceHandle>> {
        let wanted = desired.to_desired();
        let handle = match actual.and_then(|found| found.handles.first()) {
            None => self.handler.create(&wanted).await?,
            Some(existing) => self.handler.update(existing, &wanted).await?,
        };
        Ok(vec![handle])
    }
}
