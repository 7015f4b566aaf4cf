//! Three-way conflict resolution for GGRC object saves
//!
//! When a save is rejected with HTTP 409 the object was modified on the
//! server since it was loaded. The resolvers in this crate compare three
//! versions of the object's attributes:
//!
//! - **previous**: the snapshot taken before local edits
//! - **current**: the locally edited copy
//! - **remote**: what the server holds now
//!
//! and decide, field by field, whether the local edit can be carried over
//! onto the remote state or whether the two sides diverged.
//!
//! # Key Components
//!
//! - [`build_change_descriptor`]: pairwise-equality classification of one value
//! - [`json_eq`]: deep equality with numbers compared by value
//! - [`simple_field_resolver`]: resolves a single (dot-path) field
//! - [`custom_attribute_resolver`]: merges custom attribute value lists
//! - [`resolve_attribute_objects`]: identity-based merge of mapped objects
//! - [`resolve_snapshot`]: runs the above over a whole object
//!
//! All resolvers are pure. They return what should be written and leave
//! applying it to the caller.
//!
//! # Example
//!
//! ```
//! use ggrc_conflict::{resolve_snapshot, ConflictSnapshot};
//! use serde_json::json;
//!
//! let snapshot = ConflictSnapshot {
//!     base: json!({"title": "Audit", "status": "Draft"}),
//!     local: json!({"title": "Audit 2024", "status": "Draft"}),
//!     remote: json!({"title": "Audit", "status": "In Progress"}),
//! };
//!
//! let resolution = resolve_snapshot(&snapshot, &["title", "status"]);
//! assert!(!resolution.has_conflict());
//! assert_eq!(resolution.merged["title"], "Audit 2024");
//! assert_eq!(resolution.merged["status"], "In Progress");
//! ```

pub mod attribute_objects;
pub mod custom_attributes;
pub mod descriptor;
pub mod equality;
pub mod field;
pub mod path;
pub mod snapshot;

// Re-export main types
pub use attribute_objects::{resolve_attribute_objects, AttributeObject};
pub use custom_attributes::{
    custom_attribute_resolver, CustomAttributeResolution, CustomAttributeValue,
};
pub use descriptor::{build_change_descriptor, ChangeDescriptor};
pub use equality::{json_eq, DeepEq};
pub use field::{simple_field_resolver, FieldResolution, FieldUpdate};
pub use snapshot::{resolve_snapshot, ConflictSnapshot, SnapshotResolution};
