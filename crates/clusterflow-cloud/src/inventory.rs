//! Cluster inventory and type-level dependency metadata
//!
//! An [`Inventory`] is a snapshot of everything a cluster owns, keyed by
//! `type:id`. Each descriptor carries the resource types it blocks and the
//! types it is blocked by, taken from a [`DependencyTable`].

use crate::error::Result;
use crate::handler::HandlerRegistry;
use crate::resource::{ResourceHandle, ResourceType};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Type-level deletion constraints.
///
/// An edge `blocker -> blocked` means no resource of type `blocked` may be
/// deleted while any resource of type `blocker` remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTable {
    edges: BTreeMap<ResourceType, BTreeSet<ResourceType>>,
}

impl Default for DependencyTable {
    fn default() -> Self {
        Self::empty()
            .with_edge(ResourceType::Instance, ResourceType::Volume)
            .with_edge(ResourceType::Instance, ResourceType::PrivateNetwork)
            .with_edge(ResourceType::Gateway, ResourceType::PrivateNetwork)
    }
}

impl DependencyTable {
    pub fn empty() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }

    pub fn with_edge(mut self, blocker: ResourceType, blocked: ResourceType) -> Self {
        self.edges.entry(blocker).or_default().insert(blocked);
        self
    }

    /// Types that cannot be deleted while a resource of `resource_type` exists
    pub fn blocks(&self, resource_type: ResourceType) -> BTreeSet<ResourceType> {
        self.edges.get(&resource_type).cloned().unwrap_or_default()
    }

    /// Inverse of [`blocks`](Self::blocks)
    pub fn blocked_by(&self, resource_type: ResourceType) -> BTreeSet<ResourceType> {
        self.edges
            .iter()
            .filter(|(_, blocked)| blocked.contains(&resource_type))
            .map(|(blocker, _)| *blocker)
            .collect()
    }

    pub fn describe(&self, handle: ResourceHandle) -> ResourceDescriptor {
        let resource_type = handle.resource_type;
        ResourceDescriptor {
            resource_type,
            id: handle.id.clone(),
            name: handle.name.clone(),
            blocks: self.blocks(resource_type),
            blocked_by: self.blocked_by(resource_type),
            handle,
        }
    }
}

/// One live resource plus its dependency metadata
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub resource_type: ResourceType,
    pub id: String,
    pub name: String,
    pub blocks: BTreeSet<ResourceType>,
    pub blocked_by: BTreeSet<ResourceType>,
    pub handle: ResourceHandle,
}

impl ResourceDescriptor {
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    descriptors: BTreeMap<String, ResourceDescriptor>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: ResourceDescriptor) {
        self.descriptors.insert(descriptor.key(), descriptor);
    }

    pub fn get(&self, key: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn count_of(&self, resource_type: ResourceType) -> usize {
        self.iter()
            .filter(|d| d.resource_type == resource_type)
            .count()
    }

    /// Types in `descriptor.blocked_by` that still have another live resource
    pub fn blockers(&self, descriptor: &ResourceDescriptor) -> Vec<ResourceType> {
        let key = descriptor.key();
        descriptor
            .blocked_by
            .iter()
            .copied()
            .filter(|t| {
                self.descriptors
                    .iter()
                    .any(|(k, d)| d.resource_type == *t && *k != key)
            })
            .collect()
    }

    /// A new inventory without the given `type:id` keys
    pub fn without<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Inventory {
        let mut next = self.clone();
        for key in keys {
            next.descriptors.remove(key);
        }
        next
    }
}

impl FromIterator<ResourceDescriptor> for Inventory {
    fn from_iter<I: IntoIterator<Item = ResourceDescriptor>>(iter: I) -> Self {
        let mut inventory = Inventory::new();
        for descriptor in iter {
            inventory.insert(descriptor);
        }
        inventory
    }
}

/// Lists a cluster's resources through every registered handler
pub struct InventoryBuilder<'a> {
    registry: &'a HandlerRegistry,
    table: DependencyTable,
}

impl<'a> InventoryBuilder<'a> {
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self {
            registry,
            table: DependencyTable::default(),
        }
    }

    pub fn with_table(mut self, table: DependencyTable) -> Self {
        self.table = table;
        self
    }

    pub async fn build(&self, cluster: &str) -> Result<Inventory> {
        let mut inventory = Inventory::new();
        for handler in self.registry.iter() {
            let handles = handler.list(cluster).await?;
            debug!(
                cluster,
                resource_type = %handler.resource_type(),
                count = handles.len(),
                "listed"
            );
            for handle in handles {
                inventory.insert(self.table.describe(handle));
            }
        }
        info!(cluster, resources = inventory.len(), "inventory built");
        Ok(inventory)
    }
}
