//! Builder for complete machines.

use crate::builder::error::BuildError;
use crate::builder::state::StateBuilder;
use crate::builder::transition::TransitionBuilder;
use crate::core::{ActionCall, Machine, StateDecl, Transition, DONE};
use crate::host::{Host, NoHost};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Fluent builder for a [`Machine`].
///
/// `build()` validates the whole declaration eagerly: transition uniqueness,
/// the initial transition, action-list syntax, deferred triggers, do-actions
/// and that the host provides every non-built-in action.
///
/// ```
/// use runstate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
///
/// let machine = MachineBuilder::new("blinker")
///     .transition(TransitionBuilder::new().initial().to("off"))
///     .transition(TransitionBuilder::new().from("off").on("t").to("on"))
///     .transition(TransitionBuilder::new().from("on").on("t").to("off"))
///     .state(StateBuilder::new("off").entry("start_timer('t', 500)"))
///     .state(StateBuilder::new("on").entry("start_timer('t', 500)"))
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.id(), "blinker");
/// ```
pub struct MachineBuilder {
    id: String,
    host: Option<Arc<dyn Host>>,
    transitions: Vec<TransitionBuilder>,
    states: Vec<StateBuilder>,
}

impl MachineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: None,
            transitions: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Builder for a machine with a generated unique id.
    pub fn anonymous() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Object whose actions the machine runs. Defaults to [`NoHost`], which
    /// only allows built-in actions.
    pub fn host(mut self, host: impl Host + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    /// Host shared with other machines.
    pub fn shared_host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn transition(mut self, transition: TransitionBuilder) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn state(mut self, state: StateBuilder) -> Self {
        self.states.push(state);
        self
    }

    pub fn build(self) -> Result<Machine, BuildError> {
        let host: Arc<dyn Host> = self.host.unwrap_or_else(|| Arc::new(NoHost));

        let mut initial = None;
        let mut transitions = Vec::with_capacity(self.transitions.len());
        for builder in self.transitions {
            let transition = builder.build()?;
            if !transition.is_initial() {
                transitions.push(transition);
            } else if initial.replace(transition).is_some() {
                return Err(BuildError::DuplicateInitialTransition { machine: self.id });
            }
        }
        let initial = initial.ok_or_else(|| BuildError::MissingInitialTransition {
            machine: self.id.clone(),
        })?;

        let mut states = Vec::with_capacity(self.states.len());
        let mut names = HashSet::new();
        for builder in self.states {
            let (decl, internal) = builder.build()?;
            if !names.insert(decl.name().to_string()) {
                return Err(BuildError::DuplicateState { state: decl.name });
            }
            states.push(decl);
            transitions.extend(internal);
        }

        check_unique(&transitions)?;
        check_states(&states, &transitions)?;
        check_actions(host.as_ref(), &initial, &transitions, &states)?;

        Ok(Machine::from_parts(self.id, initial, transitions, states, host))
    }
}

fn check_unique(transitions: &[Transition]) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for transition in transitions {
        let trigger = transition.trigger().unwrap_or_default();
        if !seen.insert((transition.source(), trigger)) {
            return Err(BuildError::DuplicateTransition {
                state: transition.source().to_string(),
                trigger: trigger.to_string(),
            });
        }
    }
    Ok(())
}

fn check_states(states: &[StateDecl], transitions: &[Transition]) -> Result<(), BuildError> {
    let declared = |state: &str, trigger: &str| {
        transitions
            .iter()
            .find(|t| t.source() == state && t.trigger() == Some(trigger))
    };

    for state in states {
        for trigger in state.deferred() {
            if declared(state.name(), trigger).is_some_and(Transition::is_internal) {
                return Err(BuildError::DeferredAndInternal {
                    state: state.name().to_string(),
                    trigger: trigger.clone(),
                });
            }
        }
        if state.do_action().is_some() && declared(state.name(), DONE).is_none() {
            return Err(BuildError::DoWithoutDone {
                state: state.name().to_string(),
            });
        }
    }
    Ok(())
}

fn check_actions(
    host: &dyn Host,
    initial: &Transition,
    transitions: &[Transition],
    states: &[StateDecl],
) -> Result<(), BuildError> {
    let check = |actions: &[ActionCall], context: &dyn Fn() -> String| {
        match actions
            .iter()
            .find(|action| !action.is_builtin() && !host.provides(action.name()))
        {
            Some(action) => Err(BuildError::UnknownAction {
                name: action.name().to_string(),
                context: context(),
            }),
            None => Ok(()),
        }
    };

    for transition in std::iter::once(initial).chain(transitions) {
        check(transition.effect(), &|| match transition.trigger() {
            Some(trigger) => format!(
                "effect of transition from {} on {trigger:?}",
                transition.source()
            ),
            None => "effect of the initial transition".to_string(),
        })?;
    }
    for state in states {
        let name = state.name();
        check(state.entry(), &|| format!("entry actions of {name}"))?;
        check(state.exit(), &|| format!("exit actions of {name}"))?;
        check(
            state.do_action().map(std::slice::from_ref).unwrap_or_default(),
            &|| format!("do-action of {name}"),
        )?;
    }
    Ok(())
}
