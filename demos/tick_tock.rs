//! Tick Tock
//!
//! A single machine alternating between two states on a timer, counting
//! ticks until it sends itself to `final`.
//!
//! Key concepts:
//! - `start_timer` built-in in entry actions
//! - Typed host actions via the `actions!` macro
//! - Actions sending events to their own machine
//! - Pending timers are cancelled when the machine terminates
//!
//! Run with: RUST_LOG=runstate=debug cargo run --example tick_tock

use runstate::actions;
use runstate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
use runstate::driver::Driver;
use runstate::host::{ActionError, Context, Invocation};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const ROUNDS: usize = 4;

#[derive(Default)]
struct Clock {
    ticks: AtomicUsize,
}

impl Clock {
    fn tick(&self, ctx: &mut Context, _call: &Invocation<'_>) -> Result<(), ActionError> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[{}] tick {n}", ctx.machine_id());
        if n == ROUNDS {
            ctx.send("enough");
        }
        Ok(())
    }

    fn tock(&self, ctx: &mut Context, _call: &Invocation<'_>) -> Result<(), ActionError> {
        println!("[{}] tock", ctx.machine_id());
        Ok(())
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Tick Tock ===\n");

    let clock = Arc::new(Clock::default());
    let machine = MachineBuilder::new("clock")
        .host(actions!(shared clock.clone() => { tick, tock }))
        .transition(TransitionBuilder::new().initial().to("tick"))
        .transition(TransitionBuilder::new().from("tick").on("t").to("tock"))
        .transition(TransitionBuilder::new().from("tock").on("t").to("tick"))
        .transition(TransitionBuilder::new().from("tick").on("enough").to("final"))
        .state(StateBuilder::new("tick").entry("tick; start_timer('t', 250)"))
        .state(StateBuilder::new("tock").entry("tock; start_timer('t', 250)"))
        .build()
        .unwrap();

    let driver = Driver::new();
    driver.add_machine(machine);
    driver.start().unwrap();
    driver.wait_until_finished().unwrap();

    println!(
        "\nFinished after {} ticks",
        clock.ticks.load(Ordering::SeqCst)
    );
}
