//! Events routed through a driver's queue.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Positional arguments carried by an event or declared on an action.
pub type Args = Vec<Value>;

/// Keyword arguments carried by an event.
pub type Kwargs = serde_json::Map<String, Value>;

/// Trigger sent to a machine when its do-action completes.
pub const DONE: &str = "done";

/// A signal, expired timer, or completion addressed to one machine.
///
/// An event without a trigger is the marker that runs a machine's initial
/// transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub trigger: Option<String>,
    pub machine: String,
    #[serde(default)]
    pub args: Args,
    #[serde(default)]
    pub kwargs: Kwargs,
}

impl Event {
    /// Create an event with no arguments.
    pub fn new(trigger: impl Into<String>, machine: impl Into<String>) -> Self {
        Self {
            trigger: Some(trigger.into()),
            machine: machine.into(),
            args: Args::new(),
            kwargs: Kwargs::new(),
        }
    }

    /// The trigger-less event that starts a machine.
    pub fn initial(machine: impl Into<String>) -> Self {
        Self {
            trigger: None,
            machine: machine.into(),
            args: Args::new(),
            kwargs: Kwargs::new(),
        }
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initial_event_has_no_trigger() {
        let event = Event::initial("stm");
        assert_eq!(event.trigger(), None);
        assert_eq!(event.machine, "stm");
    }

    #[test]
    fn builder_methods_attach_arguments() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("b1".to_string(), json!("bbb"));

        let event = Event::new("a", "stm")
            .with_args(vec![json!("hi")])
            .with_kwargs(kwargs);

        assert_eq!(event.trigger(), Some("a"));
        assert_eq!(event.args, vec![json!("hi")]);
        assert_eq!(event.kwargs["b1"], json!("bbb"));
    }

    #[test]
    fn event_deserializes_without_arguments() {
        let event: Event = serde_json::from_str(r#"{"trigger":"t","machine":"m"}"#).unwrap();
        assert_eq!(event, Event::new("t", "m"));
    }
}
