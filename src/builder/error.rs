//! Errors reported while building machines.

use crate::core::ParseError;
use thiserror::Error;

/// Declaration errors, detected by `build()` before a machine ever runs.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Machine {machine} has no initial transition. Add one with TransitionBuilder::new().initial()")]
    MissingInitialTransition { machine: String },

    #[error("Machine {machine} declares more than one initial transition")]
    DuplicateInitialTransition { machine: String },

    #[error("Transition source state not specified. Call .from(state) or .initial()")]
    MissingSource,

    #[error("Transition from {state} has no trigger. Call .on(trigger)")]
    MissingTrigger { state: String },

    #[error("The initial transition cannot have a trigger, found {trigger:?}")]
    TriggerOnInitial { trigger: String },

    #[error("The initial transition cannot be internal")]
    InternalInitial,

    #[error("Transition from {state} on {trigger:?} has no target. Call .to(state) or .decide(..)")]
    MissingTarget { state: String, trigger: String },

    #[error("Internal transition from {state} on {trigger:?} cannot have a target")]
    TargetOnInternal { state: String, trigger: String },

    #[error("Transition from {state} on {trigger:?} cannot target {target:?}")]
    InvalidTarget {
        state: String,
        trigger: String,
        target: String,
    },

    #[error("Decision transition from {state} on {trigger:?} has no candidate targets")]
    EmptyCandidates { state: String, trigger: String },

    #[error("{name:?} is reserved and cannot be used as {usage}")]
    ReservedName { name: String, usage: &'static str },

    #[error("Duplicate transition from {state} on {trigger:?}")]
    DuplicateTransition { state: String, trigger: String },

    #[error("State {state} is declared more than once")]
    DuplicateState { state: String },

    #[error("State {state} both defers {trigger:?} and declares an internal transition for it")]
    DeferredAndInternal { state: String, trigger: String },

    #[error("State {state} declares more than one do-action")]
    MultipleDoActions { state: String },

    #[error("State {state} has a do-action but no transition triggered by \"done\"")]
    DoWithoutDone { state: String },

    #[error("Host does not provide action {name:?} used in {context}")]
    UnknownAction { name: String, context: String },

    #[error("Invalid action list in {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: ParseError,
    },
}
