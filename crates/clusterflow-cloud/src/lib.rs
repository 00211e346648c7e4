//! ClusterFlow Cloud Engine
//!
//! Declarative reconciliation and dependency-ordered teardown of the cloud
//! resources that make up a Kubernetes cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 ClusterFlow CLI                 │
//! │            (cflow reconcile / delete)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               clusterflow-cloud                 │
//! │  ┌──────────────────┐  ┌─────────────────────┐  │
//! │  │ ClusterReconciler│  │ TeardownScheduler   │  │
//! │  │  Task / diff     │  │  Inventory          │  │
//! │  └────────┬─────────┘  └──────────┬──────────┘  │
//! │  ┌────────▼───────────────────────▼──────────┐  │
//! │  │   HandlerRegistry → ResourceHandler       │  │
//! │  │   wait_until · reach_state                │  │
//! │  └────────────────────┬──────────────────────┘  │
//! │  ┌────────────────────▼──────────────────────┐  │
//! │  │ InstanceApi VpcApi GatewayApi LbApi       │  │
//! │  │ DomainApi                                 │  │
//! │  └────────────────────┬──────────────────────┘  │
//! └───────────────────────┼─────────────────────────┘
//!                         │
//!                 ┌───────▼───────┐
//!                 │   scaleway    │
//!                 │    binding    │
//!                 └───────────────┘
//! ```

pub mod action;
pub mod api;
pub mod cluster;
pub mod desired;
pub mod diff;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod inventory;
pub mod model;
pub mod power;
pub mod reconcile;
pub mod resource;
pub mod tags;
pub mod tasks;
pub mod teardown;
pub mod wait;

#[cfg(test)]
mod testing;

// Re-exports
pub use action::{Action, ActionType, ApplyResult, Plan, PlanSummary};
pub use api::{CloudApis, DomainApi, GatewayApi, InstanceApi, LbApi, VpcApi};
pub use cluster::{ClusterReconciler, ReconcileReport};
pub use desired::{DesiredResource, DesiredSet};
pub use error::{CloudError, Result, StuckReport};
pub use handler::{HandlerRegistry, ResourceHandler};
pub use inventory::{DependencyTable, Inventory, InventoryBuilder, ResourceDescriptor};
pub use reconcile::Reconciled;
pub use resource::{ResourceHandle, ResourceType};
pub use teardown::{TeardownConfig, TeardownReport, TeardownScheduler};
pub use wait::WaitConfig;
