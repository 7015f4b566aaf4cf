//! Whole-object resolution after a rejected save.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::custom_attributes::{custom_attribute_resolver, CustomAttributeValue};
use crate::field::simple_field_resolver;

/// Attribute key holding custom attribute values on GGRC objects.
pub const CUSTOM_ATTRIBUTE_VALUES: &str = "custom_attribute_values";

/// The three versions of an object involved in a 409.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictSnapshot {
    /// Attributes as loaded, before local edits
    pub base: Value,
    /// Attributes with local edits
    pub local: Value,
    /// Attributes the server returned with the conflict
    pub remote: Value,
}

/// Result of [`resolve_snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotResolution {
    /// Remote attributes with every safe local edit applied
    pub merged: Value,
    /// Fields that diverged on both sides, in the order they were checked
    pub conflicts: Vec<String>,
}

impl SnapshotResolution {
    pub fn has_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

fn custom_attribute_values(attrs: &Value) -> Result<Vec<CustomAttributeValue>, serde_json::Error> {
    match attrs.get(CUSTOM_ATTRIBUTE_VALUES) {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(values) => serde_json::from_value(values.clone()),
    }
}

/// Carry local edits onto the remote version of an object.
///
/// `fields` are resolved one by one with [`simple_field_resolver`]. When the
/// base object has `custom_attribute_values` they are merged with
/// [`custom_attribute_resolver`]; lists that do not parse are reported as a
/// conflict on that key instead of being guessed at.
pub fn resolve_snapshot(snapshot: &ConflictSnapshot, fields: &[&str]) -> SnapshotResolution {
    let mut merged = snapshot.remote.clone();
    let mut conflicts = Vec::new();

    for field in fields {
        let resolution =
            simple_field_resolver(&snapshot.base, &snapshot.local, &snapshot.remote, field, None);
        if resolution.has_conflict {
            conflicts.push(field.to_string());
        }
        resolution.apply_to(&mut merged);
    }

    if snapshot.base.get(CUSTOM_ATTRIBUTE_VALUES).is_some() {
        let parsed = (
            custom_attribute_values(&snapshot.base),
            custom_attribute_values(&snapshot.local),
            custom_attribute_values(&snapshot.remote),
        );

        match parsed {
            (Ok(previous), Ok(current), Ok(remote)) => {
                let resolution = custom_attribute_resolver(&previous, &current, &remote, &remote);
                if resolution.has_conflict {
                    conflicts.push(CUSTOM_ATTRIBUTE_VALUES.to_string());
                }
                match serde_json::to_value(&resolution.values) {
                    Ok(values) => {
                        if let Value::Object(map) = &mut merged {
                            map.insert(CUSTOM_ATTRIBUTE_VALUES.to_string(), values);
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Could not serialize merged custom attributes");
                        conflicts.push(CUSTOM_ATTRIBUTE_VALUES.to_string());
                    }
                }
            }
            _ => {
                debug!("Unparseable custom attribute values, leaving remote state");
                conflicts.push(CUSTOM_ATTRIBUTE_VALUES.to_string());
            }
        }
    }

    if !conflicts.is_empty() {
        debug!(conflicts = ?conflicts, "Snapshot has unresolved conflicts");
    }

    SnapshotResolution { merged, conflicts }
}
