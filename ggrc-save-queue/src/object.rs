//! The contract the model layer implements to be saved through the queue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SaveError;

/// Static naming metadata of a model type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Key used in request and response bodies (e.g. `"control"`)
    pub table_singular: String,
    /// Collection endpoint segment (e.g. `"controls"`)
    pub table_plural: String,
    /// Display model name used for telemetry (e.g. `"Control"`)
    pub model_singular: String,
}

impl ModelMeta {
    pub fn new(
        table_singular: impl Into<String>,
        table_plural: impl Into<String>,
        model_singular: impl Into<String>,
    ) -> Self {
        Self {
            table_singular: table_singular.into(),
            table_plural: table_plural.into(),
            model_singular: model_singular.into(),
        }
    }
}

/// An object that can be saved through the [`SaveQueue`](crate::SaveQueue).
///
/// New objects are created in batches through the collection endpoint.
/// Existing objects are saved one by one with [`Saveable::save_existing`].
#[async_trait]
pub trait Saveable: Send + Sync {
    /// Naming metadata of this object's type.
    fn model(&self) -> &ModelMeta;

    /// Whether the object has never been persisted.
    fn is_new(&self) -> bool;

    /// Whether the create should run as a server-side background task.
    fn run_in_background(&self) -> bool {
        false
    }

    /// Request body for this object, without the type key.
    fn serialize(&self) -> Value;

    /// Post-create hook, called with the type-keyed payload of a successful
    /// batch entry. Its return value settles the pending save.
    fn created(&self, payload: Value) -> Result<Value, SaveError>;

    /// Save an already persisted object.
    async fn save_existing(&self) -> Result<Value, SaveError>;
}
