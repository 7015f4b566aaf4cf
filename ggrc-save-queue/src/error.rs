//! Error types for the save queue

use serde_json::Value;
use thiserror::Error;

/// Failure of a batch request as a whole.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered the collection POST with a non-success status
    #[error("Server error {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be read as JSON
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transport settings that cannot be turned into a client
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a single pending save did not complete.
#[derive(Debug, Clone, Error)]
pub enum SaveError {
    /// The batch request carrying this object failed
    #[error("Batch request failed: {0}")]
    Transport(String),

    /// The server rejected this object, or its response entry was malformed
    #[error("Save rejected: {entry:?}")]
    Rejected { entry: Option<Value> },

    /// The post-create hook failed
    #[error("Post-create hook failed: {0}")]
    Hook(String),

    /// Saving an existing object failed
    #[error("Update failed: {0}")]
    Update(String),

    /// The queue went away before the save settled
    #[error("Save was cancelled")]
    Cancelled,
}

impl SaveError {
    /// HTTP status of a rejected entry, when it carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SaveError::Rejected { entry: Some(entry) } => entry
                .get(0)
                .and_then(Value::as_f64)
                .filter(|s| s.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(s))
                .map(|s| s as u16),
            _ => None,
        }
    }
}

impl From<TransportError> for SaveError {
    fn from(err: TransportError) -> Self {
        SaveError::Transport(err.to_string())
    }
}

/// What a settled save resolved with.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Created in a batch; holds what the post-create hook returned
    Created(Value),
    /// Accepted as part of a background job shared by the whole batch
    BackgroundTask(Value),
    /// Existing object saved directly
    Updated(Value),
}

/// Result type for a single save
pub type SaveResult = std::result::Result<SaveOutcome, SaveError>;
