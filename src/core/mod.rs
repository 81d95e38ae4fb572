//! Declarations and execution of individual state machines.
//!
//! - [`parse_actions`] reads the action-list mini-language used by the
//!   builders
//! - [`Transition`] and [`StateDecl`] hold the immutable declarations
//! - [`Machine`] executes one transition at a time against its host
//!
//! Nothing here owns a thread. Machines are run by a
//! [`Driver`](crate::driver::Driver).

mod action;
mod event;
mod machine;
mod state;
mod transition;

pub use action::{parse_actions, ActionCall, ParseError, BUILTINS};
pub use event::{Args, Event, Kwargs, DONE};
pub use machine::{Machine, MachineDescription, Outcome, StateDescription, TransitionDescription};
pub use state::{ControlState, FINAL, INITIAL};
pub use transition::{DecisionFn, StateDecl, Target, Transition};
