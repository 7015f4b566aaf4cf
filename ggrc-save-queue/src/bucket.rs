//! Per-type batching state and response redistribution.

use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use tracing::trace;

use crate::error::{SaveError, SaveOutcome};
use crate::object::Saveable;
use crate::pending::PendingSave;

/// Identifies a bucket: one per type and background flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub type_name: String,
    pub background: bool,
}

impl BucketKey {
    pub fn new(type_name: impl Into<String>, background: bool) -> Self {
        Self {
            type_name: type_name.into(),
            background,
        }
    }

    pub fn for_object(object: &dyn Saveable) -> Self {
        Self::new(&object.model().table_singular, object.run_in_background())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.background {
            write!(f, "{}_bg", self.type_name)
        } else {
            write!(f, "{}", self.type_name)
        }
    }
}

/// A batch that went out together and the body the server answered with.
pub type SaveResponse = (Vec<PendingSave>, Value);

/// New objects of one type waiting for a batched create.
#[derive(Debug)]
pub struct SaveBucket {
    pub(crate) objs: VecDeque<PendingSave>,
    pub(crate) type_name: String,
    pub(crate) plural: String,
    pub(crate) background: bool,
    /// Batch responses not yet redistributed
    pub(crate) save_responses: Vec<SaveResponse>,
    /// A dispatch cycle is running or queued for this bucket
    pub(crate) in_flight: bool,
}

impl SaveBucket {
    pub fn new(type_name: impl Into<String>, plural: impl Into<String>, background: bool) -> Self {
        Self {
            objs: VecDeque::new(),
            type_name: type_name.into(),
            plural: plural.into(),
            background,
            save_responses: Vec::new(),
            in_flight: false,
        }
    }

    /// Take the objects for the next request.
    ///
    /// Background buckets send everything they hold in one request;
    /// foreground buckets send at most `batch_size`.
    pub fn take_batch(&mut self, batch_size: usize) -> Vec<PendingSave> {
        let size = if self.background {
            self.objs.len()
        } else {
            batch_size.min(self.objs.len())
        };
        self.objs.drain(..size).collect()
    }

    pub fn push(&mut self, pending: PendingSave) {
        self.objs.push_back(pending);
    }

    pub fn pending(&self) -> usize {
        self.objs.len()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn is_background(&self) -> bool {
        self.background
    }
}

/// Status and payload of a well-formed `[status, payload]` entry.
///
/// The status is read as a number, so `201.0` counts as `201`.
fn parse_entry(entry: Option<&Value>) -> Option<(f64, &Value)> {
    match entry? {
        Value::Array(pair) if pair.len() == 2 => Some((pair[0].as_f64()?, &pair[1])),
        _ => None,
    }
}

/// Settle every object of every batch from its positional response entry.
///
/// Entry `i` of a response belongs to object `i` of the batch. A 2xx entry
/// runs the object's post-create hook with the payload under `type_name`;
/// anything else, including a missing or malformed entry, rejects that
/// object alone.
pub fn process_save_responses(type_name: &str, responses: Vec<SaveResponse>) {
    for (objs, data) in responses {
        for (idx, pending) in objs.into_iter().enumerate() {
            let entry = data.get(idx);
            match parse_entry(entry) {
                Some((status, payload)) if (200.0..300.0).contains(&status) => {
                    let payload = payload.get(type_name).cloned().unwrap_or(Value::Null);
                    match pending.object().created(payload) {
                        Ok(value) => pending.resolve(SaveOutcome::Created(value)),
                        Err(e) => pending.reject(e),
                    }
                }
                _ => {
                    trace!(type_name, idx, "Rejecting batch entry");
                    pending.reject(SaveError::Rejected {
                        entry: entry.cloned(),
                    });
                }
            }
        }
    }
}
