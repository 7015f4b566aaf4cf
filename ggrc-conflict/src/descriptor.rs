//! Change classification for a single value.

use serde::{Deserialize, Serialize};

use crate::equality::DeepEq;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// How one value moved between the base snapshot, the local copy and the
/// server copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescriptor {
    /// Changed on both sides, and not to the same value
    pub has_conflict: bool,
    /// Local value differs from the base snapshot
    pub is_changed_locally: bool,
}

/// Classify a value using pairwise [`DeepEq`] only.
///
/// For JSON attributes pass `Option<&serde_json::Value>` so an absent field
/// and an explicit `null` stay distinct.
pub fn build_change_descriptor<T>(previous: &T, current: &T, remote: &T) -> ChangeDescriptor
where
    T: DeepEq + ?Sized,
{
    let changed_on_server = !previous.deep_eq(remote);
    let changed_locally = !previous.deep_eq(current);
    let different = !current.deep_eq(remote);

    ChangeDescriptor {
        has_conflict: changed_on_server && changed_locally && different,
        is_changed_locally: changed_locally,
    }
}
