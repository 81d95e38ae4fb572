//! Driver errors.

use crate::driver::DriverState;
use thiserror::Error;

/// Errors returned by driver lifecycle operations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Cannot {operation} a driver that is {state}")]
    InvalidState {
        operation: &'static str,
        state: DriverState,
    },

    #[error("Failed to spawn the dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("The dispatch thread panicked")]
    DispatchPanicked,

    #[error("Invalid driver configuration: {0}")]
    Config(#[from] serde_json::Error),
}
