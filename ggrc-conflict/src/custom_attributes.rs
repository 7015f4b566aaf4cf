//! Merging of custom attribute value lists.
//!
//! Each list holds at most one entry per `custom_attribute_id`. Entries are
//! matched across the three versions by that id and resolved field by
//! field: `attribute_value` as a plain value, `attribute_objects` as a
//! whole list first and by object identity when both sides changed it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::attribute_objects::{resolve_attribute_objects, AttributeObject};
use crate::descriptor::build_change_descriptor;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// One custom attribute value attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CustomAttributeValue {
    /// Id of the custom attribute definition
    pub custom_attribute_id: i64,
    /// Scalar value; `Some(Value::Null)` is an explicit null
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute_value: Option<Value>,
    /// Mapped objects (people, for Map:Person attributes)
    #[serde(default)]
    pub attribute_objects: Option<Vec<AttributeObject>>,
    #[serde(flatten)]
    #[cfg_attr(feature = "typescript", ts(skip))]
    pub extra: Map<String, Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl CustomAttributeValue {
    /// Value entry for a definition.
    pub fn with_value(custom_attribute_id: i64, value: impl Into<Value>) -> Self {
        Self {
            custom_attribute_id,
            attribute_value: Some(value.into()),
            attribute_objects: None,
            extra: Map::new(),
        }
    }

    /// Object-list entry for a definition.
    pub fn with_objects(custom_attribute_id: i64, objects: Vec<AttributeObject>) -> Self {
        Self {
            custom_attribute_id,
            attribute_value: None,
            attribute_objects: Some(objects),
            extra: Map::new(),
        }
    }
}

/// Result of [`custom_attribute_resolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeResolution {
    /// At least one `attribute_value` diverged on both sides
    pub has_conflict: bool,
    /// The container list with every safe local change applied
    pub values: Vec<CustomAttributeValue>,
}

fn find(values: &[CustomAttributeValue], id: i64) -> Option<&CustomAttributeValue> {
    values.iter().find(|v| v.custom_attribute_id == id)
}

/// Merge custom attribute values onto `container`.
///
/// Walks the entries of `previous`. Value conflicts are reported through
/// `has_conflict`; conflicting object lists are merged with
/// [`resolve_attribute_objects`] and never reported. Entries missing from
/// `current` or `remote` count as absent fields; entries missing from
/// `container` receive no writes.
pub fn custom_attribute_resolver(
    previous: &[CustomAttributeValue],
    current: &[CustomAttributeValue],
    remote: &[CustomAttributeValue],
    container: &[CustomAttributeValue],
) -> CustomAttributeResolution {
    let mut values = container.to_vec();
    let mut has_conflict = false;

    for previous_item in previous {
        let id = previous_item.custom_attribute_id;
        let current_item = find(current, id);
        let remote_item = find(remote, id);

        let previous_value = previous_item.attribute_value.as_ref();
        let current_value = current_item.and_then(|v| v.attribute_value.as_ref());
        let remote_value = remote_item.and_then(|v| v.attribute_value.as_ref());
        let value = build_change_descriptor(&previous_value, &current_value, &remote_value);

        let previous_objects = previous_item.attribute_objects.as_ref();
        let current_objects = current_item.and_then(|v| v.attribute_objects.as_ref());
        let remote_objects = remote_item.and_then(|v| v.attribute_objects.as_ref());
        let objects = build_change_descriptor(&previous_objects, &current_objects, &remote_objects);

        if let Some(target) = values.iter_mut().find(|v| v.custom_attribute_id == id) {
            if value.is_changed_locally && !value.has_conflict {
                target.attribute_value = current_value.cloned();
            }

            if objects.has_conflict {
                trace!(custom_attribute_id = id, "Merging diverged attribute objects");
                target.attribute_objects = resolve_attribute_objects(
                    previous_objects.map(Vec::as_slice).unwrap_or_default(),
                    current_objects.map(Vec::as_slice).unwrap_or_default(),
                    remote_objects.map(Vec::as_slice).unwrap_or_default(),
                );
            } else if objects.is_changed_locally {
                target.attribute_objects = current_objects.cloned();
            }
        }

        if value.has_conflict {
            trace!(custom_attribute_id = id, "Custom attribute value conflict");
        }
        has_conflict = has_conflict || value.has_conflict;
    }

    CustomAttributeResolution {
        has_conflict,
        values,
    }
}
