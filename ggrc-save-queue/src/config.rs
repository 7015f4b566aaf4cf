//! Configuration for the save queue.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Save queue tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveQueueConfig {
    /// Quiet period before queued requests are fired (ms)
    pub delay_ms: u64,
    /// Maximum number of requests in flight at any given time
    pub max_instances: usize,
    /// Maximum objects per foreground batch POST
    pub batch_size: usize,
}

impl Default for SaveQueueConfig {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            max_instances: 3,
            batch_size: 1000,
        }
    }
}

impl SaveQueueConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Set the debounce delay.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Set the concurrent request limit.
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// Set the foreground batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Concurrent request limit, never below one.
    pub fn permits(&self) -> usize {
        self.max_instances.max(1)
    }

    /// Foreground batch size, never below one.
    pub fn batch_limit(&self) -> usize {
        self.batch_size.max(1)
    }
}
