use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::schema::{Field, Schema};

/// One attribute whose tracked value differs from the desired value.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub name: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    /// The change cannot be applied in place.
    pub forces_new: bool,
}

/// Differences between tracked state and desired configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceDiff {
    pub changes: Vec<AttributeChange>,
}

impl ResourceDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.forces_new)
    }

    /// Names of the attributes that force replacement.
    pub fn replace_fields(&self) -> Vec<String> {
        self.changes
            .iter()
            .filter(|c| c.forces_new)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Compare tracked state with a normalized configuration (see
/// [`Schema::normalize`]).
///
/// Computed fields the configuration leaves unset keep whatever the state
/// holds. Set fields compare by element hash, so fields excluded from the
/// hash never show up as changes.
pub fn diff(schema: &Schema, prior: &Map<String, Value>, desired: &Map<String, Value>) -> ResourceDiff {
    let mut changes = Vec::new();

    for field in &schema.fields {
        if field.removed.is_some() {
            continue;
        }
        let old = prior.get(field.name).filter(|v| !v.is_null());
        let new = desired.get(field.name).filter(|v| !v.is_null());

        let changed = match (old, new) {
            (_, None) if field.computed => false,
            (None, None) => false,
            (old, Some(new)) => !values_equal(field, old, new),
            (Some(_), None) => true,
        };

        if changed {
            changes.push(AttributeChange {
                name: field.name.to_string(),
                old: old.cloned(),
                new: new.cloned(),
                forces_new: field.forces_replacement(),
            });
        }
    }

    ResourceDiff { changes }
}

fn values_equal(field: &Field, old: Option<&Value>, new: &Value) -> bool {
    match (field.set_hash, old, new) {
        (Some(hash), old, Value::Array(new_items)) => {
            let old_items = match old {
                Some(Value::Array(items)) => items.as_slice(),
                Some(_) => return false,
                None => &[],
            };
            let old_set: BTreeSet<u32> = old_items.iter().map(hash).collect();
            let new_set: BTreeSet<u32> = new_items.iter().map(hash).collect();
            old_set == new_set
        }
        (_, Some(old), new) => old == new,
        (_, None, _) => false,
    }
}
