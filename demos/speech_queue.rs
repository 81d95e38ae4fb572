//! Speech Queue
//!
//! A speaker that says one sentence at a time. Saying a sentence takes a
//! while and runs as a do-action on its own thread; sentences arriving in
//! the meantime are deferred until the speaker is ready again.
//!
//! Key concepts:
//! - Do-actions and the `done` event
//! - Deferred triggers
//! - Event arguments passed with `(*)`
//!
//! Run with: cargo run --example speech_queue

use runstate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
use runstate::core::Event;
use runstate::driver::Driver;
use runstate::host::Actions;
use serde_json::json;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Speech Queue ===\n");

    let host = Actions::new(())
        .on("speak", |_, ctx, call| {
            let text: String = call.arg(0)?;
            println!("[{}] saying: {text}", ctx.machine_id());
            thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .on("finished", |_, _, call| {
            let text: String = call.arg(0)?;
            println!("  finished: {text}");
            Ok(())
        });

    let speaker = MachineBuilder::new("speaker")
        .host(host)
        .transition(TransitionBuilder::new().initial().to("ready"))
        .transition(TransitionBuilder::new().from("ready").on("speak").to("speaking"))
        .transition(
            TransitionBuilder::new()
                .from("speaking")
                .on("done")
                .effect("finished(*)")
                .to("ready"),
        )
        .transition(TransitionBuilder::new().from("ready").on("quit").to("final"))
        .state(
            StateBuilder::new("speaking")
                .do_action("speak(*)")
                .defer("speak")
                .defer("quit"),
        )
        .build()
        .unwrap();

    let driver = Driver::new();
    driver.add_machine(speaker);
    driver.start().unwrap();

    for text in ["Hello.", "How are you?", "Goodbye."] {
        driver.send_event(Event::new("speak", "speaker").with_args(vec![json!(text)]));
    }
    driver.send("quit", "speaker");

    thread::sleep(Duration::from_millis(100));
    println!("\n{}", driver.status());

    driver.wait_until_finished().unwrap();
    println!("Speaker is done");
}
