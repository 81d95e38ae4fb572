//! Typed action registry over a shared host value.

use crate::host::{ActionError, Context, Host, Invocation};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Handler<H> =
    Box<dyn Fn(&H, &mut Context, &Invocation<'_>) -> Result<(), ActionError> + Send + Sync>;

/// Maps action names to handlers over a host value of type `H`.
///
/// The host is held in an `Arc` so that callers can keep a handle to it and
/// inspect it while the driver runs.
pub struct Actions<H> {
    host: Arc<H>,
    handlers: HashMap<String, Handler<H>>,
}

impl<H: Send + Sync + 'static> Actions<H> {
    /// Create a registry owning `host`.
    pub fn new(host: H) -> Self {
        Self::shared(Arc::new(host))
    }

    /// Create a registry over a host shared with the caller.
    pub fn shared(host: Arc<H>) -> Self {
        Self {
            host,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler. A later registration under the same name wins.
    pub fn on<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&H, &mut Context, &Invocation<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Registered action names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl<H: Send + Sync + 'static> Host for Actions<H> {
    fn invoke(&self, ctx: &mut Context, call: &Invocation<'_>) -> Result<(), ActionError> {
        let handler = self
            .handlers
            .get(call.name())
            .ok_or_else(|| ActionError::Unknown {
                name: call.name().to_string(),
            })?;
        handler(&self.host, ctx, call)
    }

    fn provides(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl<H> fmt::Debug for Actions<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Actions").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Kwargs;
    use crate::driver::Driver;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    fn recorder_actions(host: Arc<Recorder>) -> Actions<Recorder> {
        Actions::shared(host).on("add", |host, _ctx, call| {
            let value: String = call.arg(0)?;
            host.calls.lock().push(value);
            Ok(())
        })
    }

    #[test]
    fn invoke_dispatches_to_registered_handler() {
        let host = Arc::new(Recorder::default());
        let actions = recorder_actions(host.clone());
        let mut ctx = Context::dispatch(Driver::new(), "stm".to_string());

        let args = vec![json!("entry")];
        let kwargs = Kwargs::new();
        actions
            .invoke(&mut ctx, &Invocation::new("add", &args, &kwargs))
            .unwrap();

        assert_eq!(*host.calls.lock(), vec!["entry".to_string()]);
    }

    #[test]
    fn unknown_names_are_reported() {
        let actions = recorder_actions(Arc::new(Recorder::default()));
        let mut ctx = Context::dispatch(Driver::new(), "stm".to_string());

        let kwargs = Kwargs::new();
        let err = actions
            .invoke(&mut ctx, &Invocation::new("missing", &[], &kwargs))
            .unwrap_err();

        assert_eq!(
            err,
            ActionError::Unknown {
                name: "missing".to_string()
            }
        );
        assert!(actions.provides("add"));
        assert!(!actions.provides("missing"));
    }

    #[test]
    fn debug_lists_sorted_names() {
        let actions = Actions::new(())
            .on("b", |_, _, _| Ok(()))
            .on("a", |_, _, _| Ok(()));
        assert_eq!(format!("{actions:?}"), r#"Actions { names: ["a", "b"] }"#);
    }
}
