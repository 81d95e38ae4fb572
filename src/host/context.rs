//! Capabilities handed to actions while they run.

use crate::core::{Args, Event, Kwargs};
use crate::driver::Driver;
use crate::host::{ActionError, Invocation};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// What an action may do to its machine and driver.
///
/// Handlers on the dispatch thread get a context bound to the machine being
/// executed. Do-actions get one bound to the same machine on their worker
/// thread; there `terminate` is queued and applied by the dispatch thread.
pub struct Context {
    driver: Driver,
    machine: String,
    worker: bool,
    terminate: bool,
}

impl Context {
    pub(crate) fn dispatch(driver: Driver, machine: String) -> Self {
        Self {
            driver,
            machine,
            worker: false,
            terminate: false,
        }
    }

    pub(crate) fn worker(driver: Driver, machine: String) -> Self {
        Self {
            driver,
            machine,
            worker: true,
            terminate: false,
        }
    }

    /// Id of the machine this action belongs to.
    pub fn machine_id(&self) -> &str {
        &self.machine
    }

    /// Whether the action runs on a do-action worker thread.
    pub fn on_worker(&self) -> bool {
        self.worker
    }

    /// Start a timer, or restart it if one with the same name is active.
    ///
    /// The delay is a minimum; delivery may be later under load.
    pub fn start_timer(&mut self, name: &str, delay: Duration) {
        self.driver.start_timer(&self.machine, name, delay);
    }

    /// Stop a timer. Nothing happens if it is not active.
    pub fn stop_timer(&mut self, name: &str) {
        self.driver.stop_timer(&self.machine, name);
    }

    /// Remaining time of an active timer.
    pub fn get_timer(&self, name: &str) -> Option<Duration> {
        self.driver.get_timer(&self.machine, name)
    }

    /// Send a trigger to this machine.
    pub fn send(&self, trigger: &str) {
        self.driver.send(trigger, self.machine.as_str());
    }

    /// Send a trigger with arguments to this machine.
    pub fn send_with(&self, trigger: &str, args: Args, kwargs: Kwargs) {
        self.driver.send_event(
            Event::new(trigger, self.machine.as_str())
                .with_args(args)
                .with_kwargs(kwargs),
        );
    }

    /// Send a trigger to another machine on the same driver.
    pub fn send_to(&self, machine: &str, trigger: &str) {
        self.driver.send(trigger, machine);
    }

    /// Send a trigger with arguments to another machine on the same driver.
    pub fn send_to_with(&self, machine: &str, trigger: &str, args: Args, kwargs: Kwargs) {
        self.driver.send_event(
            Event::new(trigger, machine)
                .with_args(args)
                .with_kwargs(kwargs),
        );
    }

    /// Terminate this machine once the running transition completes.
    pub fn terminate(&mut self) {
        if self.worker {
            debug!(machine = %self.machine, "termination requested from do-action");
            self.driver.terminate(self.machine.as_str());
        } else {
            self.terminate = true;
        }
    }

    pub(crate) fn terminate_requested(&self) -> bool {
        self.terminate
    }

    pub(crate) fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Run one of the built-in actions named in `BUILTINS`.
    pub(crate) fn run_builtin(&mut self, call: &Invocation<'_>) -> Result<(), ActionError> {
        match call.name() {
            "start_timer" => {
                call.expect_args(2, 2)?;
                let name: String = call.arg(0)?;
                let delay = millis(&call.args()[1]).ok_or_else(|| ActionError::Arguments {
                    name: call.name().to_string(),
                    reason: format!("invalid delay {}", call.args()[1]),
                })?;
                self.start_timer(&name, delay);
            }
            "stop_timer" => {
                call.expect_args(1, 1)?;
                let name: String = call.arg(0)?;
                self.stop_timer(&name);
            }
            "terminate" => {
                call.expect_args(0, 0)?;
                self.terminate();
            }
            "send" => {
                call.expect_args(1, 2)?;
                let trigger: String = call.arg(0)?;
                match call.args().len() {
                    1 => self.send(&trigger),
                    _ => {
                        let machine: String = call.arg(1)?;
                        self.send_to(&machine, &trigger);
                    }
                }
            }
            other => {
                return Err(ActionError::Unknown {
                    name: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// Delay in milliseconds, given as a number or a numeric string.
fn millis(value: &Value) -> Option<Duration> {
    let ms = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (ms.is_finite() && ms >= 0.0).then(|| Duration::from_micros((ms * 1000.0).round() as u64))
}
