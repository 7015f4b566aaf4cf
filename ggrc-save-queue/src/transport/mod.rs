//! HTTP transport abstraction.
//!
//! - [`HttpTransport`]: the collection API over reqwest
//! - [`MockTransport`]: scripted transport for tests

pub mod http;
pub mod mock;
pub mod traits;

pub use http::{HttpTransport, HttpTransportConfig, BACKGROUND_TASK_HEADER};
pub use mock::{MockTransport, RecordedRequest};
pub use traits::Transport;
