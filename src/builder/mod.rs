//! Builder API for machine declarations.
//!
//! Transitions and states are declared with fluent builders; action lists
//! use the textual syntax read by [`parse_actions`](crate::core::parse_actions).
//! All validation happens in [`MachineBuilder::build`].

pub mod error;
pub mod machine;
pub mod macros;
pub mod state;
pub mod transition;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use state::StateBuilder;
pub use transition::TransitionBuilder;
