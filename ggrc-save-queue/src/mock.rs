//! Mock saveable object for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::SaveError;
use crate::object::{ModelMeta, Saveable};

/// Mock object for testing.
///
/// Serializes to fixed attributes, records the payload of its post-create
/// hook and counts direct saves.
pub struct MockObject {
    meta: ModelMeta,
    attrs: Value,
    background: bool,
    new: AtomicBool,
    fail_updates: bool,
    panic_on_serialize: bool,
    panic_on_created: bool,
    created_payload: Mutex<Option<Value>>,
    update_count: AtomicUsize,
}

impl MockObject {
    /// Create a new (unsaved) object.
    pub fn new(meta: ModelMeta, attrs: Value) -> Self {
        Self {
            meta,
            attrs,
            background: false,
            new: AtomicBool::new(true),
            fail_updates: false,
            panic_on_serialize: false,
            panic_on_created: false,
            created_payload: Mutex::new(None),
            update_count: AtomicUsize::new(0),
        }
    }

    /// A new Control.
    pub fn control(attrs: Value) -> Self {
        Self::new(ModelMeta::new("control", "controls", "Control"), attrs)
    }

    /// Create in a background task.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Mark as already persisted.
    pub fn persisted(self) -> Self {
        self.new.store(false, Ordering::SeqCst);
        self
    }

    /// Make direct saves fail.
    pub fn with_failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Panic when the queue serializes the object.
    pub fn with_panic_on_serialize(mut self) -> Self {
        self.panic_on_serialize = true;
        self
    }

    /// Panic in the post-create hook.
    pub fn with_panic_on_created(mut self) -> Self {
        self.panic_on_created = true;
        self
    }

    /// Payload the post-create hook was called with.
    pub fn created_payload(&self) -> Option<Value> {
        self.created_payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of direct saves.
    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Saveable for MockObject {
    fn model(&self) -> &ModelMeta {
        &self.meta
    }

    fn is_new(&self) -> bool {
        self.new.load(Ordering::SeqCst)
    }

    fn run_in_background(&self) -> bool {
        self.background
    }

    fn serialize(&self) -> Value {
        if self.panic_on_serialize {
            panic!("mock serialize failure");
        }
        self.attrs.clone()
    }

    fn created(&self, payload: Value) -> Result<Value, SaveError> {
        if self.panic_on_created {
            panic!("mock post-create failure");
        }
        *self
            .created_payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(payload.clone());
        self.new.store(false, Ordering::SeqCst);
        Ok(payload)
    }

    async fn save_existing(&self) -> Result<Value, SaveError> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates {
            return Err(SaveError::Update("mock update failure".to_string()));
        }
        Ok(self.attrs.clone())
    }
}
