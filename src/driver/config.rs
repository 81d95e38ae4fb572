//! Driver configuration.

use crate::driver::error::DriverError;
use serde::{Deserialize, Serialize};

/// Settings a driver is constructed with.
///
/// Every field has a default, so a configuration file only needs the
/// settings it changes:
///
/// ```rust
/// use runstate::driver::DriverConfig;
///
/// let config = DriverConfig::from_json(r#"{ "keep_active": true }"#).unwrap();
/// assert!(config.keep_active);
/// assert_eq!(config.max_transitions, None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Keep running after the last machine terminated.
    pub keep_active: bool,

    /// Stop after this many transitions. `None` runs without limit.
    pub max_transitions: Option<usize>,

    /// Name given to the dispatch thread.
    pub thread_name: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            keep_active: false,
            max_transitions: None,
            thread_name: "runstate-dispatch".to_string(),
        }
    }
}

impl DriverConfig {
    pub fn from_json(json: &str) -> Result<Self, DriverError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Options for one run of the dispatch loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub max_transitions: Option<usize>,
    pub keep_active: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `n` transitions.
    pub fn max_transitions(mut self, n: usize) -> Self {
        self.max_transitions = Some(n);
        self
    }

    /// Keep running after the last machine terminated.
    pub fn keep_active(mut self, keep_active: bool) -> Self {
        self.keep_active = keep_active;
        self
    }
}

impl From<&DriverConfig> for RunOptions {
    fn from(config: &DriverConfig) -> Self {
        Self {
            max_transitions: config.max_transitions,
            keep_active: config.keep_active,
        }
    }
}
