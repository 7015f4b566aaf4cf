//! Single-field resolution.

use serde_json::Value;

use crate::descriptor::build_change_descriptor;
use crate::path::{get_path, set_path};

/// A write the caller should apply to its container.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    /// Dot-path to write
    pub path: String,
    /// Local value to carry over; `None` means the field was removed locally
    pub value: Option<Value>,
}

/// Outcome of [`simple_field_resolver`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldResolution {
    /// Both sides changed the field to different values
    pub has_conflict: bool,
    /// Present only when the local edit is safe to keep
    pub update: Option<FieldUpdate>,
}

impl FieldResolution {
    /// Apply the pending write, if any.
    pub fn apply_to(&self, container: &mut Value) {
        if let Some(update) = &self.update {
            set_path(container, &update.path, update.value.clone());
        }
    }
}

/// Resolve one field of an object.
///
/// `key` is looked up in all three attribute maps. When the field changed
/// locally and there is no conflict, the local value found at
/// `root_key` (or `key` when no root is given) becomes the update. A
/// conflicting field yields no update; the caller decides what to do.
pub fn simple_field_resolver(
    base_attrs: &Value,
    attrs: &Value,
    remote_attrs: &Value,
    key: &str,
    root_key: Option<&str>,
) -> FieldResolution {
    let previous = get_path(base_attrs, key);
    let current = get_path(attrs, key);
    let remote = get_path(remote_attrs, key);

    let descriptor = build_change_descriptor(&previous, &current, &remote);

    let update = if descriptor.is_changed_locally && !descriptor.has_conflict {
        let path = root_key.unwrap_or(key);
        Some(FieldUpdate {
            path: path.to_string(),
            value: get_path(attrs, path).cloned(),
        })
    } else {
        None
    };

    FieldResolution {
        has_conflict: descriptor.has_conflict,
        update,
    }
}
