//! Core trait for transports.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

/// Sends batched creates to the collection endpoint.
///
/// `body` is the ordered list of `{type: serialized}` maps. A successful
/// response is either `{"background_task": {...}}` or a list aligned by
/// position with `body`, each entry `[status, {type: payload}]`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_collection(
        &self,
        plural: &str,
        body: Vec<Value>,
        background: bool,
    ) -> Result<Value, TransportError>;
}
