//! Ping Pong
//!
//! Two machines on one driver passing a ball back and forth with `send`.
//! Each hit waits for a timer; after a fixed number of rallies both players
//! leave and the driver stops on its own.
//!
//! Key concepts:
//! - Several machines sharing one dispatch thread
//! - `send(trigger, machine)` between machines
//! - Driver configuration loaded from JSON
//!
//! Run with: cargo run --example ping_pong

use runstate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
use runstate::driver::{Driver, DriverConfig};
use runstate::host::Actions;
use runstate::Machine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const RALLIES: usize = 5;

fn player(name: &str, opponent: &str, serves: bool, hits: Arc<AtomicUsize>) -> Machine {
    let host = Actions::shared(hits).on("hit", |hits, ctx, _call| {
        let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
        println!("{:>5}: hit {n}", ctx.machine_id());
        if n >= RALLIES * 2 {
            ctx.send("leave");
        }
        Ok(())
    });

    let first = if serves { "swinging" } else { "waiting" };
    MachineBuilder::new(name)
        .host(host)
        .transition(TransitionBuilder::new().initial().to(first))
        .transition(TransitionBuilder::new().from("waiting").on("ball").to("swinging"))
        .transition(
            TransitionBuilder::new()
                .from("swinging")
                .on("swing")
                .effect(format!("hit; send('ball', '{opponent}')"))
                .to("waiting"),
        )
        .transition(TransitionBuilder::new().from("waiting").on("leave").to("final"))
        .state(StateBuilder::new("swinging").entry("start_timer('swing', 100)"))
        .build()
        .unwrap()
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Ping Pong ===\n");

    let config = DriverConfig::from_json(r#"{ "thread_name": "table", "max_transitions": 200 }"#)
        .unwrap();
    let driver = Driver::with_config(config);

    let hits = Arc::new(AtomicUsize::new(0));
    driver.add_machine(player("ping", "pong", true, hits.clone()));
    driver.add_machine(player("pong", "ping", false, hits.clone()));

    driver.start().unwrap();
    driver.wait_until_finished().unwrap();

    println!("\n{} hits in total", hits.load(Ordering::SeqCst));
    println!("{}", driver.status());
}
