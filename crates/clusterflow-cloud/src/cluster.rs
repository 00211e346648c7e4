//! Whole-cluster reconcile

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::desired::{
    DesiredResource, DesiredSet, DnsRecordSpec, LoadBalancerSpec, PrivateNetworkSpec, VolumeSpec,
};
use crate::error::{CloudError, Result};
use crate::handler::HandlerRegistry;
use crate::reconcile::{Reconciled, plan, reconcile};
use crate::tasks::{InstanceGroupTask, ResourceTask};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Outcome of reconciling a desired set.
///
/// Reconciliation stops at the first failure; `error` holds it and
/// `resources` lists what was reconciled before.
#[derive(Debug)]
pub struct ReconcileReport {
    pub applied: ApplyResult,
    pub resources: Vec<Reconciled>,
    pub error: Option<CloudError>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ClusterReconciler {
    registry: HandlerRegistry,
    cancel: Option<CancellationToken>,
}

impl ClusterReconciler {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            cancel: None,
        }
    }

    /// Stop before the next resource once `token` is cancelled
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn reconcile_one(&self, desired: &DesiredResource) -> Result<Reconciled> {
        let handler = self.registry.get(desired.resource_type())?;
        match desired {
            DesiredResource::Instance(spec) => {
                reconcile(&InstanceGroupTask::new(handler), spec).await
            }
            DesiredResource::Volume(spec) => {
                reconcile(&ResourceTask::<VolumeSpec>::new(handler), spec).await
            }
            DesiredResource::PrivateNetwork(spec) => {
                reconcile(&ResourceTask::<PrivateNetworkSpec>::new(handler), spec).await
            }
            DesiredResource::LoadBalancer(spec) => {
                reconcile(&ResourceTask::<LoadBalancerSpec>::new(handler), spec).await
            }
            DesiredResource::DnsRecord(spec) => {
                reconcile(&ResourceTask::<DnsRecordSpec>::new(handler), spec).await
            }
        }
    }

    pub async fn plan_one(&self, desired: &DesiredResource) -> Result<Action> {
        let handler = self.registry.get(desired.resource_type())?;
        match desired {
            DesiredResource::Instance(spec) => plan(&InstanceGroupTask::new(handler), spec).await,
            DesiredResource::Volume(spec) => {
                plan(&ResourceTask::<VolumeSpec>::new(handler), spec).await
            }
            DesiredResource::PrivateNetwork(spec) => {
                plan(&ResourceTask::<PrivateNetworkSpec>::new(handler), spec).await
            }
            DesiredResource::LoadBalancer(spec) => {
                plan(&ResourceTask::<LoadBalancerSpec>::new(handler), spec).await
            }
            DesiredResource::DnsRecord(spec) => {
                plan(&ResourceTask::<DnsRecordSpec>::new(handler), spec).await
            }
        }
    }

    /// Reconcile every resource in creation order, stopping at the first error
    pub async fn reconcile_cluster(&self, set: &DesiredSet) -> ReconcileReport {
        let start = Instant::now();
        let mut report = ReconcileReport {
            applied: ApplyResult::new(),
            resources: Vec::new(),
            error: None,
        };

        for desired in set.in_creation_order() {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                let e = CloudError::Cancelled(format!("reconciling {}", desired.key()));
                error!(resource = %desired.key(), "reconcile cancelled");
                report.applied.add_failure(desired.key(), e.to_string());
                report.error = Some(e);
                break;
            }
            match self.reconcile_one(desired).await {
                Ok(done) => {
                    let mut message = format!("{}", done.action);
                    if !done.changed.is_empty() && done.action != ActionType::NoOp {
                        message = format!("{} ({})", message, done.changed.join(", "));
                    }
                    report.applied.add_success(done.key.clone(), message);
                    report.resources.push(done);
                }
                Err(e) => {
                    error!(resource = %desired.key(), error = %e, "reconcile failed");
                    report.applied.add_failure(desired.key(), e.to_string());
                    report.error = Some(e);
                    break;
                }
            }
        }

        report.applied.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            cluster = %set.cluster,
            succeeded = report.applied.succeeded.len(),
            failed = report.applied.failed.len(),
            "cluster reconcile finished"
        );
        report
    }

    /// Plan every resource without changing anything
    pub async fn plan_cluster(&self, set: &DesiredSet) -> Result<Plan> {
        let mut actions = Vec::new();
        for desired in set.in_creation_order() {
            actions.push(self.plan_one(desired).await?);
        }
        Ok(Plan::new(actions))
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }
}
