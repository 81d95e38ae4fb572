//! The seam between a machine and the object whose actions it runs.
//!
//! Action names in declarations are bound to typed handlers instead of being
//! looked up by reflection. A host is anything implementing [`Host`]; most
//! hosts are built with the [`Actions`] registry, which maps names to
//! closures over a shared host value and lets the builder reject unknown
//! names before the machine ever runs.
//!
//! # Example
//!
//! ```rust
//! use runstate::host::{Actions, Host};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: AtomicUsize,
//! }
//!
//! let actions = Actions::new(Counter::default()).on("inc", |counter, _ctx, _call| {
//!     counter.count.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! assert!(actions.provides("inc"));
//! assert!(!actions.provides("dec"));
//! ```

mod actions;
mod context;

pub use actions::Actions;
pub use context::Context;

use crate::core::{ActionCall, Kwargs};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{error, trace};

/// Errors raised while running a single action.
///
/// They are logged by the machine and never abort the remaining actions of a
/// transition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    #[error("No action named '{name}'")]
    Unknown { name: String },

    #[error("Bad arguments for '{name}': {reason}")]
    Arguments { name: String, reason: String },

    #[error("Action '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("Action '{name}' panicked: {message}")]
    Panicked { name: String, message: String },
}

/// Arguments of one action call, borrowed from the declaration or the event.
#[derive(Clone, Copy, Debug)]
pub struct Invocation<'a> {
    name: &'a str,
    args: &'a [Value],
    kwargs: &'a Kwargs,
}

impl<'a> Invocation<'a> {
    pub fn new(name: &'a str, args: &'a [Value], kwargs: &'a Kwargs) -> Self {
        Self { name, args, kwargs }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    pub fn kwargs(&self) -> &'a Kwargs {
        self.kwargs
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, ActionError> {
        let value = self.args.get(index).ok_or_else(|| {
            self.bad_arguments(format!(
                "missing argument {index} (got {})",
                self.args.len()
            ))
        })?;
        serde_json::from_value(value.clone())
            .map_err(|err| self.bad_arguments(format!("argument {index}: {err}")))
    }

    /// Deserialize the keyword argument `key`, if present.
    pub fn kwarg<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ActionError> {
        self.kwargs
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|err| self.bad_arguments(format!("keyword '{key}': {err}")))
            })
            .transpose()
    }

    /// Fail unless the call carries between `min` and `max` positional arguments.
    pub fn expect_args(&self, min: usize, max: usize) -> Result<(), ActionError> {
        let got = self.args.len();
        if got < min || got > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(self.bad_arguments(format!("expected {expected} arguments, got {got}")));
        }
        Ok(())
    }

    /// Build a failure for this action.
    pub fn failed(&self, message: impl Display) -> ActionError {
        ActionError::Failed {
            name: self.name.to_string(),
            message: message.to_string(),
        }
    }

    fn bad_arguments(&self, reason: String) -> ActionError {
        ActionError::Arguments {
            name: self.name.to_string(),
            reason,
        }
    }
}

/// The object a machine runs its actions against.
///
/// Implementations must be `Send + Sync`: do-actions run on worker threads
/// while the dispatch thread keeps handling other transitions.
pub trait Host: Send + Sync {
    /// Run the named action.
    fn invoke(&self, ctx: &mut Context, call: &Invocation<'_>) -> Result<(), ActionError>;

    /// Whether `invoke` understands `name`. Checked at build time.
    ///
    /// Default implementation accepts every name, deferring the check to run
    /// time.
    fn provides(&self, _name: &str) -> bool {
        true
    }
}

/// Host of machines whose declarations only use built-in actions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHost;

impl Host for NoHost {
    fn invoke(&self, _ctx: &mut Context, call: &Invocation<'_>) -> Result<(), ActionError> {
        Err(ActionError::Unknown {
            name: call.name().to_string(),
        })
    }

    fn provides(&self, _name: &str) -> bool {
        false
    }
}

/// Run one declared action, routing built-ins to the context.
///
/// Failures, including panics, are logged and swallowed so that the
/// remaining actions of the transition still run.
pub(crate) fn run_action(
    host: &dyn Host,
    action: &ActionCall,
    event_args: &[Value],
    event_kwargs: &Kwargs,
    ctx: &mut Context,
) {
    let no_kwargs = Kwargs::new();
    let call = if action.uses_event_args() {
        Invocation::new(action.name(), event_args, event_kwargs)
    } else {
        Invocation::new(action.name(), action.args(), &no_kwargs)
    };
    trace!(machine = %ctx.machine_id(), action = %action, "running action");

    let result = if action.is_builtin() {
        ctx.run_builtin(&call)
    } else {
        panic::catch_unwind(AssertUnwindSafe(|| host.invoke(ctx, &call))).unwrap_or_else(
            |payload| {
                Err(ActionError::Panicked {
                    name: action.name().to_string(),
                    message: panic_message(payload.as_ref()),
                })
            },
        )
    };

    if let Err(err) = result {
        error!(machine = %ctx.machine_id(), action = %action, error = %err, "action failed");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
