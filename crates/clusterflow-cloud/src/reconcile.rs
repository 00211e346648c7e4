//! Find → Diff → Validate → Apply for a single resource
//!
//! A [`Task`] knows how to look up the actual state of one desired value and
//! how to converge it. [`reconcile`] drives the phases; [`plan`] stops before
//! anything is changed.

use crate::action::{Action, ActionType};
use crate::diff::{Delta, FieldKind, ResourceSpec};
use crate::error::{CloudError, Result};
use crate::resource::ResourceHandle;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

/// Actual state of a resource plus the live handles it was read from
#[derive(Debug, Clone)]
pub struct Found<S> {
    pub state: S,
    pub handles: Vec<ResourceHandle>,
}

/// Outcome of one reconcile run
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// `type:name` of the desired value
    pub key: String,
    pub action: ActionType,
    pub changed: Vec<&'static str>,
    /// Live handles after the run, carrying generated IDs and addresses
    pub handles: Vec<ResourceHandle>,
}

impl Reconciled {
    pub fn addresses(&self) -> Vec<String> {
        self.handles.iter().flat_map(|h| h.addresses()).collect()
    }
}

#[async_trait]
pub trait Task: Send + Sync {
    type Spec: ResourceSpec + Send + Sync;

    /// Look up the resource by its natural key. Absent is `Ok(None)`.
    async fn find(&self, desired: &Self::Spec) -> Result<Option<Found<Self::Spec>>>;

    /// Zone the task's client creates resources in, if it is zoned
    fn bound_zone(&self) -> Option<&str> {
        None
    }

    fn check_changes(
        &self,
        actual: Option<&Self::Spec>,
        desired: &Self::Spec,
        delta: &Delta,
    ) -> Result<()> {
        check_changes(actual, desired, delta)
    }

    /// Create the resource (`actual` is `None`) or apply the mutable part of `delta`.
    async fn render(
        &self,
        actual: Option<&Found<Self::Spec>>,
        desired: &Self::Spec,
        delta: &Delta,
    ) -> Result<Vec<ResourceHandle>>;
}

/// Default validation: required immutable fields on creation, no immutable
/// changes afterwards.
pub fn check_changes<S: ResourceSpec>(
    actual: Option<&S>,
    desired: &S,
    delta: &Delta,
) -> Result<()> {
    let resource = format!("{} {}", desired.resource_type(), desired.name());

    if actual.is_none() {
        if let Some(field) = desired
            .fields()
            .into_iter()
            .find(|f| f.kind == FieldKind::Immutable && f.required && f.is_empty())
        {
            return Err(CloudError::RequiredField {
                resource,
                field: field.name.to_string(),
            });
        }
        return Ok(());
    }

    let immutable = delta.immutable_changes();
    if !immutable.is_empty() {
        return Err(CloudError::ImmutableFieldChanged {
            resource,
            fields: immutable.into_iter().map(str::to_string).collect(),
        });
    }
    Ok(())
}

/// A resource can only be created in the zone its client is bound to
fn check_zone<T: Task + ?Sized>(task: &T, desired: &T::Spec) -> Result<()> {
    match (desired.zone(), task.bound_zone()) {
        (Some(wanted), Some(bound)) if wanted != bound => Err(CloudError::InvalidDesiredState(
            format!(
                "{} {} is in zone {} but the client is bound to {}",
                desired.resource_type(),
                desired.name(),
                wanted,
                bound
            ),
        )),
        _ => Ok(()),
    }
}

fn key_of<S: ResourceSpec>(desired: &S) -> String {
    format!("{}:{}", desired.resource_type(), desired.name())
}

fn action_type<S>(actual: Option<&Found<S>>, delta: &Delta) -> ActionType {
    match actual {
        None => ActionType::Create,
        Some(_) if delta.has_mutable_changes() => ActionType::Update,
        Some(_) => ActionType::NoOp,
    }
}

/// Converge one desired value. A present resource without mutable changes
/// is left untouched.
pub async fn reconcile<T>(task: &T, desired: &T::Spec) -> Result<Reconciled>
where
    T: Task + ?Sized,
{
    let key = key_of(desired);

    debug!(resource = %key, "find");
    let actual = task.find(desired).await?;

    let delta = Delta::between(actual.as_ref().map(|f| &f.state), desired);
    task.check_changes(actual.as_ref().map(|f| &f.state), desired, &delta)?;
    if actual.is_none() {
        check_zone(task, desired)?;
    }

    let action = action_type(actual.as_ref(), &delta);
    let changed = delta.changed_fields();

    let handles = match (action, actual.as_ref()) {
        (ActionType::NoOp, Some(found)) => {
            debug!(resource = %key, "up to date");
            found.handles.clone()
        }
        _ => {
            info!(resource = %key, %action, changed = ?changed, "render");
            task.render(actual.as_ref(), desired, &delta).await?
        }
    };

    Ok(Reconciled {
        key,
        action,
        changed,
        handles,
    })
}

/// Find, diff and validate without rendering
pub async fn plan<T>(task: &T, desired: &T::Spec) -> Result<Action>
where
    T: Task + ?Sized,
{
    let actual = task.find(desired).await?;
    let delta = Delta::between(actual.as_ref().map(|f| &f.state), desired);
    task.check_changes(actual.as_ref().map(|f| &f.state), desired, &delta)?;
    if actual.is_none() {
        check_zone(task, desired)?;
    }

    let action_type = action_type(actual.as_ref(), &delta);
    let changed = delta.changed_fields();
    let description = match action_type {
        ActionType::Create => format!("create {} {}", desired.resource_type(), desired.name()),
        ActionType::Update => format!(
            "update {} {} ({})",
            desired.resource_type(),
            desired.name(),
            changed.join(", ")
        ),
        _ => format!("{} {} is up to date", desired.resource_type(), desired.name()),
    };

    let mut action = Action::new(
        action_type,
        desired.resource_type(),
        desired.name(),
        description,
    )
    .with_detail("changed", json!(changed));
    if let Some(found) = &actual {
        let ids: Vec<&str> = found.handles.iter().map(|h| h.id.as_str()).collect();
        action = action.with_detail("ids", json!(ids));
    }
    Ok(action)
}
