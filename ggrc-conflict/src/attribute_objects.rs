//! Identity-based merge of objects mapped through a custom attribute.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::equality::DeepEq;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// An object referenced by a custom attribute (e.g. a mapped person).
///
/// Only `id` takes part in merging; the other fields are carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AttributeObject {
    pub id: i64,
    #[serde(flatten)]
    #[cfg_attr(feature = "typescript", ts(skip))]
    pub extra: Map<String, Value>,
}

impl AttributeObject {
    /// An object carrying nothing but its id.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            extra: Map::new(),
        }
    }
}

impl DeepEq for AttributeObject {
    fn deep_eq(&self, other: &Self) -> bool {
        self.id == other.id && self.extra.deep_eq(&other.extra)
    }
}

fn ids(objects: &[AttributeObject]) -> HashSet<i64> {
    objects.iter().map(|o| o.id).collect()
}

/// Three-way merge of object lists by `id`.
///
/// Local deletions win over the server keeping (or re-adding) an object;
/// local additions survive unless the server already has the same id.
/// Remote survivors come first, then local additions in local order.
///
/// Returns `None` when nothing is left, so the caller can tell "cleared"
/// apart from an untouched list.
pub fn resolve_attribute_objects(
    previous: &[AttributeObject],
    current: &[AttributeObject],
    remote: &[AttributeObject],
) -> Option<Vec<AttributeObject>> {
    let previous_ids = ids(previous);
    let current_ids = ids(current);
    let remote_ids = ids(remote);

    let deleted: HashSet<i64> = previous
        .iter()
        .filter(|o| !current_ids.contains(&o.id))
        .map(|o| o.id)
        .collect();

    let resolved: Vec<AttributeObject> = remote
        .iter()
        .filter(|o| !deleted.contains(&o.id))
        .chain(
            current
                .iter()
                .filter(|o| !previous_ids.contains(&o.id))
                .filter(|o| !remote_ids.contains(&o.id)),
        )
        .cloned()
        .collect();

    if resolved.is_empty() {
        None
    } else {
        Some(resolved)
    }
}
