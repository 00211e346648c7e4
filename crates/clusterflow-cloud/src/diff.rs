//! Field-level comparison of actual and desired resource values

use crate::resource::ResourceType;
use serde::Serialize;
use serde_json::Value;

/// How a field may change over a resource's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Set once at creation
    Immutable,
    /// Can be changed in place
    Mutable,
    /// Assigned by the cloud, never compared
    Computed,
}

/// One named field of a resource value
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub value: Value,
    /// Immutable fields must be set on creation unless marked optional
    pub required: bool,
}

impl Field {
    pub fn immutable(name: &'static str, value: Value) -> Self {
        Self {
            name,
            kind: FieldKind::Immutable,
            value,
            required: true,
        }
    }

    pub fn mutable(name: &'static str, value: Value) -> Self {
        Self {
            name,
            kind: FieldKind::Mutable,
            value,
            required: false,
        }
    }

    pub fn computed(name: &'static str, value: Value) -> Self {
        Self {
            name,
            kind: FieldKind::Computed,
            value,
            required: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn is_empty(&self) -> bool {
        is_empty(&self.value)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// A desired or actual resource value that can be diffed
pub trait ResourceSpec {
    fn resource_type(&self) -> ResourceType;

    fn name(&self) -> &str;

    /// All fields, in a stable order
    fn fields(&self) -> Vec<Field>;

    /// Zone the resource must be created in, for zoned types
    fn zone(&self) -> Option<&str> {
        None
    }
}

/// Per-field classification of a difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Change {
    Unchanged,
    MutableChange,
    ImmutableChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDelta {
    pub name: &'static str,
    pub change: Change,
    pub actual: Value,
    pub desired: Value,
}

/// Difference between an actual and a desired value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Delta {
    pub fields: Vec<FieldDelta>,
}

impl Delta {
    /// Compare field by field. A desired field left empty requests nothing and
    /// never counts as a change; with no actual value every field is compared
    /// against `null`.
    pub fn between<S: ResourceSpec>(actual: Option<&S>, desired: &S) -> Self {
        let actual_fields = actual.map(|a| a.fields()).unwrap_or_default();

        let fields = desired
            .fields()
            .into_iter()
            .map(|field| {
                let actual_value = actual_fields
                    .iter()
                    .find(|f| f.name == field.name)
                    .map(|f| f.value.clone())
                    .unwrap_or(Value::Null);

                let change = match field.kind {
                    FieldKind::Computed => Change::Unchanged,
                    _ if field.is_empty() || actual_value == field.value => Change::Unchanged,
                    FieldKind::Mutable => Change::MutableChange,
                    FieldKind::Immutable => Change::ImmutableChange,
                };

                FieldDelta {
                    name: field.name,
                    change,
                    actual: actual_value,
                    desired: field.value,
                }
            })
            .collect();

        Self { fields }
    }

    pub fn has_mutable_changes(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.change == Change::MutableChange)
    }

    pub fn immutable_changes(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.change == Change::ImmutableChange)
            .map(|f| f.name)
            .collect()
    }

    /// Names of every field that differs
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.change != Change::Unchanged)
            .map(|f| f.name)
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDelta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.field(name)
            .is_some_and(|f| f.change != Change::Unchanged)
    }
}
