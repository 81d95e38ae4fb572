//! Property-based tests for the action parser and event ordering.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use parking_lot::Mutex;
use proptest::prelude::*;
use runstate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
use runstate::core::{parse_actions, ActionCall, Event};
use runstate::driver::Driver;
use runstate::host::Actions;
use serde_json::{json, Value};
use std::sync::Arc;

prop_compose! {
    fn action_name()(name in "[a-z_][a-z0-9_]{0,11}") -> String {
        name
    }
}

fn literal() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
        "[ -~]{0,12}".prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
    ]
}

fn action_call() -> impl Strategy<Value = ActionCall> {
    prop_oneof![
        action_name().prop_map(ActionCall::new),
        action_name().prop_map(ActionCall::with_event_args),
        (action_name(), prop::collection::vec(literal(), 0..4))
            .prop_map(|(name, args)| ActionCall::with_args(name, args)),
    ]
}

fn render(actions: &[ActionCall]) -> String {
    actions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

proptest! {
    #[test]
    fn rendered_action_lists_parse_back(actions in prop::collection::vec(action_call(), 0..6)) {
        let parsed = parse_actions(&render(&actions)).unwrap();
        prop_assert_eq!(parsed.len(), actions.len());
        for (parsed, expected) in parsed.iter().zip(&actions) {
            prop_assert_eq!(parsed.name(), expected.name());
            prop_assert_eq!(parsed.uses_event_args(), expected.uses_event_args());
            prop_assert_eq!(parsed.to_string(), expected.to_string());
        }
    }

    #[test]
    fn empty_segments_are_ignored(
        actions in prop::collection::vec(action_call(), 1..5),
        padding in prop::collection::vec("[ ;]{0,3}", 1..5),
    ) {
        let mut input = String::new();
        for (i, action) in actions.iter().enumerate() {
            input.push_str(&padding[i % padding.len()]);
            input.push_str(&action.to_string());
            input.push(';');
        }
        let parsed = parse_actions(&input).unwrap();
        prop_assert_eq!(parsed.len(), actions.len());
    }

    #[test]
    fn parser_never_panics(input in "\\PC{0,40}") {
        let _ = parse_actions(&input);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn deferred_events_keep_arrival_order(values in prop::collection::vec(any::<i32>(), 1..12)) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let host = Actions::shared(seen.clone()).on("record", |seen, _ctx, call| {
            let value: i32 = call.arg(0)?;
            seen.lock().push(value);
            Ok(())
        });
        let machine = MachineBuilder::new("stm")
            .host(host)
            .transition(TransitionBuilder::new().initial().to("holding"))
            .transition(TransitionBuilder::new().from("holding").on("release").to("open"))
            .state(StateBuilder::new("holding").defer("item"))
            .state(StateBuilder::new("open").internal("item", "record(*)"))
            .build()
            .unwrap();

        let driver = Driver::new();
        driver.add_machine(machine);
        for value in &values {
            driver.send_event(Event::new("item", "stm").with_args(vec![json!(value)]));
        }
        driver.send("release", "stm");

        let executed = driver.step(values.len() + 2).unwrap();
        prop_assert_eq!(executed, values.len() + 2);
        prop_assert_eq!(&*seen.lock(), &values);
    }
}
