//! Control state of a running machine.
//!
//! A machine is always in exactly one control state: the `initial` sentinel
//! before its initial transition ran, a named state declared by its
//! transitions, or the terminal `final` state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the pseudo state a machine starts in.
pub const INITIAL: &str = "initial";

/// Name of the terminal state. Entering it terminates the machine.
pub const FINAL: &str = "final";

/// Current control state of a machine.
///
/// # Example
///
/// ```rust
/// use runstate::core::ControlState;
///
/// let state = ControlState::from_name("s_tick");
/// assert_eq!(state.name(), "s_tick");
/// assert!(!state.is_final());
///
/// assert!(ControlState::from_name("final").is_final());
/// assert!(ControlState::from_name("initial").is_initial());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControlState {
    /// Before the initial transition ran.
    Initial,
    /// A declared, named state.
    Named(String),
    /// Terminal state; the machine is no longer dispatched.
    Final,
}

impl ControlState {
    /// Map a state name onto a control state, recognising the reserved names.
    pub fn from_name(name: &str) -> Self {
        match name {
            INITIAL => Self::Initial,
            FINAL => Self::Final,
            other => Self::Named(other.to_string()),
        }
    }

    /// The state's name, with the reserved names for the sentinels.
    pub fn name(&self) -> &str {
        match self {
            Self::Initial => INITIAL,
            Self::Named(name) => name,
            Self::Final => FINAL,
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, Self::Initial)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final)
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for ControlState {
    fn from(name: String) -> Self {
        match name.as_str() {
            INITIAL => Self::Initial,
            FINAL => Self::Final,
            _ => Self::Named(name),
        }
    }
}

impl From<ControlState> for String {
    fn from(state: ControlState) -> Self {
        match state {
            ControlState::Named(name) => name,
            other => other.name().to_string(),
        }
    }
}
