//! Runstate: run-to-completion state machines driven by one event loop
//!
//! Many independent state machines share a [`Driver`]. The driver owns a
//! single dispatch thread that merges externally sent events with software
//! timers and executes one transition at a time, always to completion.
//!
//! # Core Concepts
//!
//! - **Machine**: states and transitions declared with builders, bound to a
//!   host object whose actions it calls
//! - **Actions**: written as `name`, `name(1, 'a')` or `name(*)` lists on
//!   transitions (effects) and states (entry, exit, do)
//! - **Timers**: `start_timer(name, ms)` delivers an event called `name` to
//!   the machine once the delay passed
//! - **Defer**: a state may postpone triggers until it is left
//! - **Do-actions**: run on their own thread and report back with `done`
//!
//! # Example
//!
//! ```rust
//! use runstate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use runstate::driver::Driver;
//! use runstate::host::Actions;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let ticks = Arc::new(AtomicUsize::new(0));
//! let host = Actions::shared(ticks.clone()).on("tick", |ticks, _ctx, _call| {
//!     ticks.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! let machine = MachineBuilder::new("clock")
//!     .host(host)
//!     .transition(TransitionBuilder::new().initial().to("running"))
//!     .transition(TransitionBuilder::new().from("running").on("stop").to("final"))
//!     .state(
//!         StateBuilder::new("running")
//!             .entry("start_timer('t', 10)")
//!             .internal("t", "tick; start_timer('t', 10)"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let driver = Driver::new();
//! driver.add_machine(machine);
//! driver.start().unwrap();
//! std::thread::sleep(std::time::Duration::from_millis(60));
//! driver.send("stop", "clock");
//! driver.wait_until_finished().unwrap();
//!
//! assert!(ticks.load(Ordering::SeqCst) >= 1);
//! ```

pub mod builder;
pub mod core;
pub mod driver;
pub mod host;

// Re-export commonly used types
pub use self::builder::{BuildError, MachineBuilder, StateBuilder, TransitionBuilder};
pub use self::core::{ControlState, Event, Machine};
pub use self::driver::{Driver, DriverConfig, DriverError, DriverState, RunOptions};
pub use self::host::{ActionError, Actions, Context, Host, Invocation};
