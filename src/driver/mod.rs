//! The run-to-completion driver.
//!
//! A driver owns one dispatch thread, one event queue, one timer table and
//! the registry of the machines assigned to it. Machines on the same driver
//! never execute concurrently: the dispatch thread runs one transition at a
//! time, always to completion, so actions may touch shared host data without
//! interleaving.
//!
//! # Lifecycle
//!
//! `Idle` → `Running` → `Stopped`. [`Driver::start`] spawns the dispatch
//! thread and returns immediately; [`Driver::stop`], a transition budget
//! running out, or the last machine terminating (unless `keep_active`) ends
//! the run. [`Driver::step`] runs the loop on the caller's thread instead.
//!
//! # Example
//!
//! ```rust
//! use runstate::builder::{MachineBuilder, TransitionBuilder};
//! use runstate::driver::Driver;
//!
//! let machine = MachineBuilder::new("stm")
//!     .transition(TransitionBuilder::new().initial().to("s1"))
//!     .transition(TransitionBuilder::new().from("s1").on("stop").to("final"))
//!     .build()
//!     .unwrap();
//!
//! let driver = Driver::new();
//! driver.add_machine(machine);
//! driver.start().unwrap();
//! driver.send("stop", "stm");
//! driver.wait_until_finished().unwrap();
//! ```

mod config;
mod error;
mod queue;
mod status;
mod timer;

pub use config::{DriverConfig, RunOptions};
pub use error::DriverError;
pub use status::{DriverStatus, MachineStatus, QueuedEvent, TimerStatus};

pub(crate) use queue::Item;

use crate::core::{Event, Machine};
use crate::host::Context;
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use queue::EventQueue;
use timer::{Timer, TimerTable};
use tracing::{debug, warn};

/// Lifecycle state of a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a run of the dispatch loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Halt {
    /// `stop()` was called or the registry ran empty.
    Stopped,
    /// The transition budget was used up.
    Budget,
}

/// Handle to a driver. Clones share the same driver.
#[derive(Clone)]
pub struct Driver {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: DriverConfig,
    pub(crate) queue: EventQueue,
    timers: Mutex<TimerTable>,
    registry: Mutex<BTreeMap<String, Machine>>,
    executing: Mutex<Option<MachineStatus>>,
    lifecycle: Mutex<DriverState>,
    active: AtomicBool,
    keep_active: AtomicBool,
    budget: Mutex<Option<usize>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    dispatching: Mutex<bool>,
    dispatch_done: Condvar,
}

/// Clears the dispatching flag when the dispatch thread exits, including by
/// unwinding.
struct DispatchGuard(Arc<Inner>);

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        *self.0.dispatching.lock() = false;
        self.0.dispatch_done.notify_all();
    }
}

impl Driver {
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                queue: EventQueue::new(),
                timers: Mutex::new(TimerTable::new()),
                registry: Mutex::new(BTreeMap::new()),
                executing: Mutex::new(None),
                lifecycle: Mutex::new(DriverState::Idle),
                active: AtomicBool::new(false),
                keep_active: AtomicBool::new(false),
                budget: Mutex::new(None),
                thread: Mutex::new(None),
                dispatching: Mutex::new(false),
                dispatch_done: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    pub fn state(&self) -> DriverState {
        *self.inner.lifecycle.lock()
    }

    /// Add a machine to this driver.
    ///
    /// The machine is reset and registered by the dispatch thread, which then
    /// runs its initial transition before any event sent after this call.
    /// A machine with the same id replaces the registered one.
    pub fn add_machine(&self, mut machine: Machine) {
        machine.reset();
        debug!(machine = %machine.id(), "adding machine");
        self.inner.queue.push_back(Item::Register(Box::new(machine)));
    }

    /// Send a trigger to a machine on this driver. Safe from any thread.
    ///
    /// Events for unknown machines are reported and dropped when dispatched.
    pub fn send(&self, trigger: impl Into<String>, machine: impl Into<String>) {
        self.send_event(Event::new(trigger, machine));
    }

    /// Send a fully specified event. Safe from any thread.
    pub fn send_event(&self, event: Event) {
        debug!(machine = %event.machine, trigger = ?event.trigger, "event queued");
        self.inner.queue.push_back(Item::Event(event));
    }

    /// Terminate a machine once the dispatch thread reaches this request.
    /// Its timers are cancelled.
    pub fn terminate(&self, machine: impl Into<String>) {
        self.inner.queue.push_back(Item::Terminate(machine.into()));
    }

    /// Start the dispatch thread using the configured run options.
    pub fn start(&self) -> Result<(), DriverError> {
        self.start_with(RunOptions::from(&self.inner.config))
    }

    /// Start the dispatch thread. Returns immediately.
    pub fn start_with(&self, options: RunOptions) -> Result<(), DriverError> {
        self.enter_running("start")?;
        self.arm(options);

        *self.inner.dispatching.lock() = true;
        let driver = self.clone();
        let spawned = thread::Builder::new()
            .name(self.inner.config.thread_name.clone())
            .spawn(move || {
                let _guard = DispatchGuard(Arc::clone(&driver.inner));
                let halt = driver.run();
                driver.finish(halt, false);
            });

        match spawned {
            Ok(handle) => {
                *self.inner.thread.lock() = Some(handle);
                Ok(())
            }
            Err(source) => {
                *self.inner.dispatching.lock() = false;
                self.inner.active.store(false, Ordering::Release);
                *self.inner.lifecycle.lock() = DriverState::Stopped;
                Err(DriverError::Spawn(source))
            }
        }
    }

    /// Run `steps` transitions on the calling thread.
    ///
    /// Blocks until the transitions ran, the driver is stopped, or the last
    /// machine terminated. When the budget is used up the driver returns to
    /// `Idle` and can be stepped or started again. Returns the number of
    /// transitions executed.
    pub fn step(&self, steps: usize) -> Result<usize, DriverError> {
        if steps == 0 {
            return Ok(0);
        }
        self.enter_running("step")?;
        self.arm(RunOptions {
            max_transitions: Some(steps),
            keep_active: self.inner.config.keep_active,
        });

        let halt = self.run();
        let remaining = self.inner.budget.lock().unwrap_or(0);
        self.finish(halt, true);
        Ok(steps - remaining)
    }

    /// Stop the driver. A transition in progress completes first.
    pub fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if *lifecycle == DriverState::Stopped {
            return;
        }
        debug!(from = %*lifecycle, "stopping driver");
        *lifecycle = DriverState::Stopped;
        drop(lifecycle);
        self.inner.active.store(false, Ordering::Release);
        self.inner.queue.wake();
    }

    /// Block until the dispatch thread finished. Returns immediately if the
    /// driver was never started.
    ///
    /// Any number of threads may wait. Only the caller that joins the thread
    /// sees [`DriverError::DispatchPanicked`]; the others return `Ok(())` once
    /// the thread is gone.
    pub fn wait_until_finished(&self) -> Result<(), DriverError> {
        let handle = self.inner.thread.lock().take();
        if let Some(handle) = handle {
            return handle.join().map_err(|_| DriverError::DispatchPanicked);
        }
        let mut dispatching = self.inner.dispatching.lock();
        while *dispatching {
            self.inner.dispatch_done.wait(&mut dispatching);
        }
        Ok(())
    }

    /// Snapshot of machines, queued events and timers.
    ///
    /// Safe to call from actions. A machine in the middle of a transition is
    /// reported in the state it was in when the transition started.
    pub fn status(&self) -> DriverStatus {
        let mut machines: Vec<MachineStatus> = {
            let registry = self.inner.registry.lock();
            let executing = self.inner.executing.lock();
            registry
                .values()
                .map(MachineStatus::from)
                .chain(executing.iter().cloned())
                .collect()
        };
        machines.sort_by(|a, b| a.id.cmp(&b.id));
        let queue = self.inner.queue.snapshot();
        let now = Instant::now();
        let timers = self
            .inner
            .timers
            .lock()
            .iter()
            .map(|timer| TimerStatus {
                machine: timer.machine.clone(),
                name: timer.name.clone(),
                delay_ms: timer.delay.as_millis() as u64,
                remaining_ms: timer.remaining(now).as_millis() as u64,
            })
            .collect();

        DriverStatus {
            taken_at: Utc::now(),
            state: self.state(),
            remaining_transitions: *self.inner.budget.lock(),
            machines,
            queue,
            timers,
        }
    }

    pub(crate) fn start_timer(&self, machine: &str, name: &str, delay: Duration) {
        debug!(machine, timer = name, ?delay, "starting timer");
        let replaced = self
            .inner
            .timers
            .lock()
            .start(Timer::new(machine, name, delay, Instant::now()));
        if replaced {
            debug!(machine, timer = name, "replaced active timer");
        }
        self.inner.queue.wake();
    }

    pub(crate) fn stop_timer(&self, machine: &str, name: &str) {
        debug!(machine, timer = name, "stopping timer");
        if self.inner.timers.lock().cancel(machine, name).is_some() {
            self.inner.queue.wake();
        }
    }

    pub(crate) fn get_timer(&self, machine: &str, name: &str) -> Option<Duration> {
        self.inner
            .timers
            .lock()
            .remaining(machine, name, Instant::now())
    }

    fn enter_running(&self, operation: &'static str) -> Result<(), DriverError> {
        let mut lifecycle = self.inner.lifecycle.lock();
        if *lifecycle != DriverState::Idle {
            return Err(DriverError::InvalidState {
                operation,
                state: *lifecycle,
            });
        }
        *lifecycle = DriverState::Running;
        Ok(())
    }

    fn arm(&self, options: RunOptions) {
        *self.inner.budget.lock() = options.max_transitions;
        self.inner
            .keep_active
            .store(options.keep_active, Ordering::Release);
        let has_budget = options.max_transitions != Some(0);
        self.inner.active.store(has_budget, Ordering::Release);
    }

    fn finish(&self, halt: Halt, stepping: bool) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if *lifecycle == DriverState::Stopped {
            return;
        }
        *lifecycle = if stepping && halt == Halt::Budget {
            DriverState::Idle
        } else {
            DriverState::Stopped
        };
    }

    /// The dispatch loop.
    fn run(&self) -> Halt {
        debug!("dispatch loop started");
        let halt = loop {
            if !self.inner.active.load(Ordering::Acquire) {
                break Halt::Stopped;
            }
            let wait = self.fire_expired_timers();
            let Some(item) = self.inner.queue.pop(wait) else {
                continue;
            };
            if !self.inner.active.load(Ordering::Acquire) {
                self.inner.queue.push_front(item);
                break Halt::Stopped;
            }

            let executed = match item {
                Item::Register(machine) => self.register(*machine),
                Item::Event(event) => self.dispatch(event),
                Item::Terminate(id) => {
                    let mut registry = self.inner.registry.lock();
                    self.deregister(&mut registry, &id);
                    false
                }
            };
            if executed && self.consume_budget() {
                break Halt::Budget;
            }
        };
        debug!(?halt, "dispatch loop finished");
        halt
    }

    /// Move expired timers to the front of the queue, earliest first, and
    /// return the time until the next one expires.
    fn fire_expired_timers(&self) -> Option<Duration> {
        let now = Instant::now();
        let (expired, next) = {
            let mut timers = self.inner.timers.lock();
            (timers.drain_expired(now), timers.next_deadline())
        };
        if !expired.is_empty() {
            for timer in &expired {
                debug!(machine = %timer.machine, timer = %timer.name, "timer expired");
            }
            self.inner.queue.extend_front(
                expired
                    .into_iter()
                    .map(|timer| Item::Event(Event::new(timer.name, timer.machine))),
            );
        }
        next.map(|deadline| deadline.saturating_duration_since(now))
    }

    fn register(&self, machine: Machine) -> bool {
        let id = machine.id().to_string();
        if self
            .inner
            .registry
            .lock()
            .insert(id.clone(), machine)
            .is_some()
        {
            warn!(machine = %id, "replaced a registered machine with the same id");
        }
        debug!(machine = %id, "machine registered");
        self.dispatch(Event::initial(id))
    }

    /// Route one event to its machine. Returns whether a transition was
    /// attempted (and counts against the budget).
    ///
    /// The machine leaves the registry while it executes so that actions can
    /// take a status snapshot.
    fn dispatch(&self, event: Event) -> bool {
        let id = event.machine.clone();
        let mut machine = {
            let mut registry = self.inner.registry.lock();
            let Some(mut machine) = registry.remove(&id) else {
                warn!(
                    machine = %id,
                    trigger = ?event.trigger,
                    "machine cannot be found, ignoring event"
                );
                return false;
            };

            if let Some(trigger) = event.trigger() {
                if machine.defers_event(trigger) {
                    debug!(machine = %id, trigger, state = %machine.state(), "event deferred");
                    machine.defer(event);
                    registry.insert(id, machine);
                    return false;
                }
            }

            *self.inner.executing.lock() = Some(MachineStatus::from(&machine));
            machine
        };

        let mut ctx = Context::dispatch(self.clone(), id.clone());
        let outcome = machine.execute(event, &mut ctx);
        debug!(machine = %id, ?outcome, "transition complete");

        let mut registry = self.inner.registry.lock();
        self.inner.executing.lock().take();
        if ctx.terminate_requested() {
            self.retire(&registry, &id);
        } else {
            registry.insert(id, machine);
        }
        true
    }

    fn deregister(&self, registry: &mut BTreeMap<String, Machine>, id: &str) {
        if registry.remove(id).is_some() {
            self.retire(registry, id);
        }
    }

    /// Cancel the timers of a removed machine and stop the driver when it
    /// was the last one.
    fn retire(&self, registry: &BTreeMap<String, Machine>, id: &str) {
        let cancelled = self.inner.timers.lock().cancel_machine(id);
        debug!(machine = id, cancelled_timers = cancelled, "machine terminated");

        if registry.is_empty() && !self.inner.keep_active.load(Ordering::Acquire) {
            debug!("no machines left, stopping driver");
            self.inner.active.store(false, Ordering::Release);
            self.inner.queue.wake();
        }
    }

    /// Count one transition. Returns true when the budget ran out.
    fn consume_budget(&self) -> bool {
        let mut budget = self.inner.budget.lock();
        let Some(remaining) = budget.as_mut() else {
            return false;
        };
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return false;
        }
        debug!("transition budget used up, stopping driver");
        self.inner.active.store(false, Ordering::Release);
        true
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("state", &self.state())
            .field("queued", &self.inner.queue.len())
            .field("timers", &self.inner.timers.lock().len())
            .finish()
    }
}
