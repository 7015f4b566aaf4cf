//! Latency instrumentation around network operations.
//!
//! Purely observational: nothing in the queue branches on what a tracker
//! does.

use std::fmt;
use std::time::Instant;
use tracing::debug;

/// User journey an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserJourney {
    Api,
}

impl fmt::Display for UserJourney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserJourney::Api => write!(f, "API"),
        }
    }
}

/// Tracked action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    /// Batch create of this many objects
    CreateObject(usize),
    /// Save of one existing object
    UpdateObject,
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserAction::CreateObject(count) => write!(f, "Create {} object(s)", count),
            UserAction::UpdateObject => write!(f, "Update object"),
        }
    }
}

/// A running measurement. Finish it with [`stop`](Self::stop) or
/// [`fail`](Self::fail); dropping it records nothing.
pub struct TrackerTimer {
    finish: Option<Box<dyn FnOnce(bool) + Send>>,
}

impl TrackerTimer {
    pub fn new(finish: impl FnOnce(bool) + Send + 'static) -> Self {
        Self {
            finish: Some(Box::new(finish)),
        }
    }

    /// A timer that records nothing.
    pub fn noop() -> Self {
        Self { finish: None }
    }

    /// Record a successful operation.
    pub fn stop(mut self) {
        if let Some(finish) = self.finish.take() {
            finish(false);
        }
    }

    /// Record a failed operation.
    pub fn fail(mut self) {
        if let Some(finish) = self.finish.take() {
            finish(true);
        }
    }
}

/// Telemetry collaborator.
pub trait Tracker: Send + Sync {
    fn start(&self, label: &str, journey: UserJourney, action: UserAction) -> TrackerTimer;
}

/// Emits one `tracing` event per finished operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracker;

impl Tracker for TracingTracker {
    fn start(&self, label: &str, journey: UserJourney, action: UserAction) -> TrackerTimer {
        let label = label.to_string();
        let started = Instant::now();
        TrackerTimer::new(move |is_error| {
            debug!(
                label = %label,
                journey = %journey,
                action = %action,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = is_error,
                "Tracked operation finished"
            );
        })
    }
}

/// Discards every measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl Tracker for NoopTracker {
    fn start(&self, _label: &str, _journey: UserJourney, _action: UserAction) -> TrackerTimer {
        TrackerTimer::noop()
    }
}
