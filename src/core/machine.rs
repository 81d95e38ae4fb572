//! A single state machine instance and its transition execution.

use crate::core::action::ActionCall;
use crate::core::event::{Args, Event, Kwargs, DONE};
use crate::core::state::{ControlState, FINAL, INITIAL};
use crate::core::transition::{StateDecl, Target, Transition};
use crate::driver::Item;
use crate::host::{panic_message, run_action, Context, Host};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, warn};

/// What a call to `execute` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Left `from` (or re-entered it) and entered `to`.
    Entered { from: ControlState, to: ControlState },

    /// Ran an internal transition; the state did not change.
    Internal,

    /// No transition is declared for the trigger in the current state.
    Ignored,

    /// Reached `final`.
    Terminated,

    /// A decision function picked a state outside its candidates.
    DecisionRejected { target: String },

    /// A decision function panicked.
    DecisionPanicked { message: String },
}

/// One state machine: immutable declarations plus the current control state
/// and the queue of deferred events.
///
/// Machines are created with [`MachineBuilder`](crate::builder::MachineBuilder)
/// and run by a [`Driver`](crate::driver::Driver). Only the driver's dispatch
/// thread mutates a registered machine.
pub struct Machine {
    id: String,
    state: ControlState,
    initial: Transition,
    transitions: Vec<Transition>,
    index: HashMap<String, HashMap<String, usize>>,
    states: Vec<StateDecl>,
    state_index: HashMap<String, usize>,
    host: Arc<dyn Host>,
    deferred: VecDeque<Event>,
}

impl Machine {
    /// Assemble a machine from validated declarations.
    pub(crate) fn from_parts(
        id: String,
        initial: Transition,
        transitions: Vec<Transition>,
        states: Vec<StateDecl>,
        host: Arc<dyn Host>,
    ) -> Self {
        let mut index: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (position, transition) in transitions.iter().enumerate() {
            if let Some(trigger) = transition.trigger() {
                index
                    .entry(transition.source().to_string())
                    .or_default()
                    .insert(trigger.to_string(), position);
            }
        }
        let state_index = states
            .iter()
            .enumerate()
            .map(|(position, state)| (state.name().to_string(), position))
            .collect();

        Self {
            id,
            state: ControlState::Initial,
            initial,
            transitions,
            index,
            states,
            state_index,
            host,
            deferred: VecDeque::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn initial_transition(&self) -> &Transition {
        &self.initial
    }

    /// Triggered transitions in declaration order, followed by the internal
    /// transitions declared on states.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn state_declarations(&self) -> &[StateDecl] {
        &self.states
    }

    /// Number of events waiting in the defer queue.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Whether the current state postpones `trigger`.
    pub fn defers_event(&self, trigger: &str) -> bool {
        match &self.state {
            ControlState::Named(name) => self
                .declaration(name)
                .is_some_and(|state| state.defers(trigger)),
            _ => false,
        }
    }

    pub(crate) fn defer(&mut self, event: Event) {
        self.deferred.push_back(event);
    }

    pub(crate) fn reset(&mut self) {
        self.state = ControlState::Initial;
        self.deferred.clear();
    }

    fn declaration(&self, name: &str) -> Option<&StateDecl> {
        self.state_index.get(name).map(|&position| &self.states[position])
    }

    fn resolve(&self, trigger: Option<&str>) -> Option<&Transition> {
        if self.state.is_initial() {
            return Some(&self.initial);
        }
        let position = *self.index.get(self.state.name())?.get(trigger?)?;
        Some(&self.transitions[position])
    }

    /// Execute the transition `event` triggers in the current state.
    ///
    /// Runs exit actions, effects and entry actions in that order on the
    /// calling thread. A failing action is logged and the remaining actions
    /// still run.
    pub(crate) fn execute(&mut self, event: Event, ctx: &mut Context) -> Outcome {
        let Some(transition) = self.resolve(event.trigger()) else {
            warn!(
                machine = %self.id,
                state = %self.state,
                trigger = ?event.trigger,
                "undeclared transition, ignoring event"
            );
            return Outcome::Ignored;
        };
        let host = self.host.as_ref();
        let from = self.state.clone();
        let none = Kwargs::new();

        if !transition.is_internal() {
            if let Some(state) = self.declaration(from.name()) {
                run_actions(host, state.exit(), &[], &none, ctx);
            }
        }
        run_actions(host, transition.effect(), &event.args, &event.kwargs, ctx);

        if transition.is_internal() {
            debug!(machine = %self.id, state = %from, trigger = ?event.trigger, "internal transition");
            return Outcome::Internal;
        }

        let target = match transition.target() {
            Target::State(name) => name.clone(),
            Target::Decision { candidates, decide } => {
                let decided =
                    panic::catch_unwind(AssertUnwindSafe(|| decide(&event.args, &event.kwargs)));
                match decided {
                    Ok(name) if candidates.contains(&name) => name,
                    Ok(name) => {
                        error!(
                            machine = %self.id,
                            state = %from,
                            target = %name,
                            ?candidates,
                            "decision returned a state outside its candidates, staying in source state"
                        );
                        return Outcome::DecisionRejected { target: name };
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(
                            machine = %self.id,
                            state = %from,
                            panic = %message,
                            "decision function panicked, staying in source state"
                        );
                        return Outcome::DecisionPanicked { message };
                    }
                }
            }
        };

        if target == FINAL {
            debug!(machine = %self.id, from = %from, "machine reached final state");
            self.state = ControlState::Final;
            ctx.terminate();
            return Outcome::Terminated;
        }

        let to = ControlState::from_name(&target);
        if to != from && !self.deferred.is_empty() {
            debug!(
                machine = %self.id,
                count = self.deferred.len(),
                "releasing deferred events"
            );
            ctx.driver()
                .inner
                .queue
                .extend_front(self.deferred.drain(..).map(Item::Event));
        }
        debug!(machine = %self.id, from = %from, to = %to, trigger = ?event.trigger, "entering state");
        self.state = to.clone();

        if let Some(state) = self.declaration(&target) {
            run_actions(self.host.as_ref(), state.entry(), &[], &none, ctx);
            if let Some(action) = state.do_action() {
                let (args, kwargs) = if action.uses_event_args() {
                    (event.args.clone(), event.kwargs.clone())
                } else {
                    (action.args().to_vec(), Kwargs::new())
                };
                launch_do(
                    Arc::clone(&self.host),
                    action.clone(),
                    args,
                    kwargs,
                    ctx,
                );
            }
        }

        Outcome::Entered { from, to }
    }

    /// Serializable summary of the declarations, for graph or model exporters.
    pub fn describe(&self) -> MachineDescription {
        let mentioned = std::iter::once(&self.initial)
            .chain(&self.transitions)
            .flat_map(|t| std::iter::once(t.source()).chain(t.target().candidates()))
            .chain(self.states.iter().map(StateDecl::name));
        let mut names: Vec<&str> = Vec::new();
        for name in mentioned {
            if name != INITIAL && name != FINAL && !names.contains(&name) {
                names.push(name);
            }
        }
        let states = names
            .into_iter()
            .map(|name| match self.declaration(name) {
                Some(state) => StateDescription::from(state),
                None => StateDescription {
                    name: name.to_string(),
                    ..StateDescription::default()
                },
            })
            .collect();

        MachineDescription {
            id: self.id.clone(),
            initial: TransitionDescription::from(&self.initial),
            transitions: self
                .transitions
                .iter()
                .map(TransitionDescription::from)
                .collect(),
            states,
        }
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("transitions", &self.transitions.len())
            .field("states", &self.states.len())
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

fn run_actions(
    host: &dyn Host,
    actions: &[ActionCall],
    args: &[serde_json::Value],
    kwargs: &Kwargs,
    ctx: &mut Context,
) {
    for action in actions {
        run_action(host, action, args, kwargs, ctx);
    }
}

/// Run a do-action on its own thread and post `done` when it returns.
fn launch_do(host: Arc<dyn Host>, action: ActionCall, args: Args, kwargs: Kwargs, ctx: &Context) {
    let driver = ctx.driver().clone();
    let machine = ctx.machine_id().to_string();
    let done = Event::new(DONE, machine.as_str())
        .with_args(args.clone())
        .with_kwargs(kwargs.clone());
    let worker_driver = driver.clone();
    let worker_machine = machine.clone();
    let worker_done = done.clone();

    let spawned = thread::Builder::new()
        .name(format!("runstate-do-{machine}"))
        .spawn(move || {
            let mut ctx = Context::worker(worker_driver.clone(), worker_machine);
            run_action(host.as_ref(), &action, &args, &kwargs, &mut ctx);
            debug!(machine = %ctx.machine_id(), action = %action, "do-action complete");
            worker_driver.send_event(worker_done);
        });

    match spawned {
        Ok(_) => debug!(machine = %machine, "started do-action"),
        Err(err) => {
            error!(machine = %machine, error = %err, "could not spawn do-action thread");
            driver.send_event(done);
        }
    }
}

/// Declarations of a machine in serializable form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MachineDescription {
    pub id: String,
    pub initial: TransitionDescription,
    pub transitions: Vec<TransitionDescription>,
    /// Every named state, in order of first mention.
    pub states: Vec<StateDescription>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionDescription {
    pub source: String,
    pub trigger: Option<String>,
    pub effect: Vec<String>,
    pub targets: Vec<String>,
    pub decision: bool,
    pub internal: bool,
}

impl From<&Transition> for TransitionDescription {
    fn from(transition: &Transition) -> Self {
        Self {
            source: transition.source().to_string(),
            trigger: transition.trigger().map(str::to_string),
            effect: transition.effect().iter().map(ToString::to_string).collect(),
            targets: transition
                .target()
                .candidates()
                .into_iter()
                .map(str::to_string)
                .collect(),
            decision: transition.target().is_decision(),
            internal: transition.is_internal(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StateDescription {
    pub name: String,
    pub entry: Vec<String>,
    pub exit: Vec<String>,
    pub do_action: Option<String>,
    pub deferred: Vec<String>,
}

impl From<&StateDecl> for StateDescription {
    fn from(state: &StateDecl) -> Self {
        Self {
            name: state.name().to_string(),
            entry: state.entry().iter().map(ToString::to_string).collect(),
            exit: state.exit().iter().map(ToString::to_string).collect(),
            do_action: state.do_action().map(ToString::to_string),
            deferred: state.deferred().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
    use crate::driver::Driver;
    use crate::host::Actions;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Log {
        lines: Mutex<Vec<String>>,
    }

    fn logging(log: Arc<Log>) -> Actions<Log> {
        Actions::shared(log).on("note", |log, _ctx, call| {
            let line: String = call.arg(0)?;
            log.lines.lock().push(line);
            Ok(())
        })
    }

    fn context(driver: &Driver) -> Context {
        Context::dispatch(driver.clone(), "stm".to_string())
    }

    fn two_states(log: Arc<Log>) -> Machine {
        MachineBuilder::new("stm")
            .host(logging(log))
            .transition(TransitionBuilder::new().initial().to("s1").effect("note('init')"))
            .transition(
                TransitionBuilder::new()
                    .from("s1")
                    .on("go")
                    .to("s2")
                    .effect("note('effect')"),
            )
            .transition(TransitionBuilder::new().from("s2").on("back").to("s1"))
            .state(StateBuilder::new("s1").exit("note('exit s1')"))
            .state(StateBuilder::new("s2").entry("note('enter s2')"))
            .build()
            .unwrap()
    }

    #[test]
    fn initial_transition_runs_regardless_of_trigger() {
        let log = Arc::new(Log::default());
        let mut machine = two_states(log.clone());
        let driver = Driver::new();

        let outcome = machine.execute(Event::new("anything", "stm"), &mut context(&driver));

        assert_eq!(
            outcome,
            Outcome::Entered {
                from: ControlState::Initial,
                to: ControlState::from_name("s1"),
            }
        );
        assert_eq!(*log.lines.lock(), vec!["init"]);
    }

    #[test]
    fn actions_run_exit_effect_entry() {
        let log = Arc::new(Log::default());
        let mut machine = two_states(log.clone());
        let driver = Driver::new();
        machine.execute(Event::initial("stm"), &mut context(&driver));

        machine.execute(Event::new("go", "stm"), &mut context(&driver));

        assert_eq!(machine.state().name(), "s2");
        assert_eq!(
            *log.lines.lock(),
            vec!["init", "exit s1", "effect", "enter s2"]
        );
    }

    #[test]
    fn undeclared_trigger_is_ignored() {
        let log = Arc::new(Log::default());
        let mut machine = two_states(log.clone());
        let driver = Driver::new();
        machine.execute(Event::initial("stm"), &mut context(&driver));

        let outcome = machine.execute(Event::new("back", "stm"), &mut context(&driver));

        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(machine.state().name(), "s1");
        assert_eq!(*log.lines.lock(), vec!["init"]);
    }

    #[test]
    fn final_target_requests_termination() {
        let mut machine = MachineBuilder::new("stm")
            .transition(TransitionBuilder::new().initial().to("s1"))
            .transition(TransitionBuilder::new().from("s1").on("stop").to("final"))
            .build()
            .unwrap();
        let driver = Driver::new();
        machine.execute(Event::initial("stm"), &mut context(&driver));

        let mut ctx = context(&driver);
        let outcome = machine.execute(Event::new("stop", "stm"), &mut ctx);

        assert_eq!(outcome, Outcome::Terminated);
        assert!(ctx.terminate_requested());
        assert!(machine.state().is_final());
    }

    #[test]
    fn decision_outside_candidates_keeps_source_state() {
        let log = Arc::new(Log::default());
        let mut machine = MachineBuilder::new("stm")
            .host(logging(log.clone()))
            .transition(TransitionBuilder::new().initial().to("s1"))
            .transition(
                TransitionBuilder::new()
                    .from("s1")
                    .on("pick")
                    .decide(["s2", "s3"], |args, _| {
                        args.first()
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string()
                    }),
            )
            .state(StateBuilder::new("s4").entry("note('enter s4')"))
            .build()
            .unwrap();
        let driver = Driver::new();
        machine.execute(Event::initial("stm"), &mut context(&driver));

        let outcome = machine.execute(
            Event::new("pick", "stm").with_args(vec![json!("s4")]),
            &mut context(&driver),
        );
        assert_eq!(
            outcome,
            Outcome::DecisionRejected {
                target: "s4".to_string()
            }
        );
        assert_eq!(machine.state().name(), "s1");
        assert!(log.lines.lock().is_empty());

        machine.execute(
            Event::new("pick", "stm").with_args(vec![json!("s3")]),
            &mut context(&driver),
        );
        assert_eq!(machine.state().name(), "s3");
    }

    #[test]
    fn panicking_decision_keeps_source_state() {
        let mut machine = MachineBuilder::new("stm")
            .transition(TransitionBuilder::new().initial().to("s1"))
            .transition(
                TransitionBuilder::new()
                    .from("s1")
                    .on("pick")
                    .decide(["s2"], |_, _| panic!("no route")),
            )
            .build()
            .unwrap();
        let driver = Driver::new();
        machine.execute(Event::initial("stm"), &mut context(&driver));

        let outcome = machine.execute(Event::new("pick", "stm"), &mut context(&driver));

        assert_eq!(
            outcome,
            Outcome::DecisionPanicked {
                message: "no route".to_string()
            }
        );
        assert_eq!(machine.state().name(), "s1");
    }

    #[test]
    fn leaving_a_state_releases_deferred_events_in_order() {
        let mut machine = MachineBuilder::new("stm")
            .transition(TransitionBuilder::new().initial().to("s1"))
            .transition(TransitionBuilder::new().from("s1").on("b").to("s2"))
            .state(StateBuilder::new("s1").defer("a"))
            .build()
            .unwrap();
        let driver = Driver::new();
        machine.execute(Event::initial("stm"), &mut context(&driver));

        assert!(machine.defers_event("a"));
        assert!(!machine.defers_event("b"));
        machine.defer(Event::new("a", "stm").with_args(vec![json!(1)]));
        machine.defer(Event::new("a", "stm").with_args(vec![json!(2)]));
        assert_eq!(machine.deferred_len(), 2);

        machine.execute(Event::new("b", "stm"), &mut context(&driver));

        assert_eq!(machine.deferred_len(), 0);
        let queued = driver.status().queue;
        let args: Vec<_> = queued.iter().map(|event| event.args.clone()).collect();
        assert_eq!(args, vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn describe_lists_every_named_state() {
        let machine = two_states(Arc::new(Log::default()));

        let description = machine.describe();

        let names: Vec<_> = description.states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s2"]);
        assert_eq!(description.initial.targets, vec!["s1"]);
        assert_eq!(description.transitions[0].effect, vec!["note(\"effect\")"]);
        assert_eq!(description.states[0].exit, vec!["note(\"exit s1\")"]);
    }

    #[test]
    fn reset_returns_to_initial_and_clears_deferred() {
        let mut machine = two_states(Arc::new(Log::default()));
        machine.defer(Event::new("x", "stm"));
        machine.reset();
        assert!(machine.state().is_initial());
        assert_eq!(machine.deferred_len(), 0);
    }
}
