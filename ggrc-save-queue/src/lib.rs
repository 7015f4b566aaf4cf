//! Save queue for the GGRC collection API
//!
//! Keeps the client from firing a request per object save. Saves are
//! collected for a short quiet period and then dispatched with a bounded
//! number of requests in flight:
//!
//! - new objects of the same type are created together through one
//!   `POST /api/{plural}` and the positional responses are handed back to
//!   each object
//! - existing objects are saved one by one through the same throttle
//! - at most one batch per type (and background flag) is out at a time
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               SaveQueue                 │
//! │   (buckets, debounced job queue,        │
//! │    admission semaphore)                 │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │  Transport  │       │   Tracker   │
//! │ (HTTP/Mock) │       │ (telemetry) │
//! └─────────────┘       └─────────────┘
//! ```
//!
//! The objects themselves implement [`Saveable`].

pub mod bucket;
pub mod config;
pub mod error;
pub mod mock;
pub mod object;
pub mod pending;
pub mod queue;
pub mod tracker;
pub mod transport;

// Re-export main types for convenience
pub use bucket::{process_save_responses, BucketKey, SaveBucket};
pub use config::SaveQueueConfig;
pub use error::{SaveError, SaveOutcome, SaveResult, TransportError};
pub use mock::MockObject;
pub use object::{ModelMeta, Saveable};
pub use pending::{PendingSave, SaveHandle};
pub use queue::SaveQueue;
pub use tracker::{NoopTracker, Tracker, TrackerTimer, TracingTracker, UserAction, UserJourney};
pub use transport::{
    HttpTransport, HttpTransportConfig, MockTransport, RecordedRequest, Transport,
    BACKGROUND_TASK_HEADER,
};
