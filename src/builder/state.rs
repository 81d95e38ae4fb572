//! Builder for state declarations.

use crate::builder::error::BuildError;
use crate::core::{parse_actions, ActionCall, StateDecl, Target, Transition, FINAL, INITIAL};

/// Builder for the actions and deferred triggers of one state.
///
/// States without actions need no declaration; naming them as transition
/// sources or targets is enough.
#[derive(Clone, Debug, Default)]
pub struct StateBuilder {
    name: String,
    entry: Vec<String>,
    exit: Vec<String>,
    do_action: Option<String>,
    internal: Vec<(String, String)>,
    deferred: Vec<String>,
}

impl StateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Actions run when the state is entered.
    pub fn entry(mut self, actions: impl Into<String>) -> Self {
        self.entry.push(actions.into());
        self
    }

    /// Actions run when the state is left.
    pub fn exit(mut self, actions: impl Into<String>) -> Self {
        self.exit.push(actions.into());
        self
    }

    /// A single action run on its own thread after entering the state. When
    /// it returns, a `done` event is sent to the machine.
    pub fn do_action(mut self, action: impl Into<String>) -> Self {
        self.do_action = Some(action.into());
        self
    }

    /// Declare an internal transition: `trigger` runs `effect` and the
    /// machine stays in this state.
    pub fn internal(mut self, trigger: impl Into<String>, effect: impl Into<String>) -> Self {
        self.internal.push((trigger.into(), effect.into()));
        self
    }

    /// Postpone `trigger` until the machine leaves this state.
    pub fn defer(mut self, trigger: impl Into<String>) -> Self {
        self.deferred.push(trigger.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate and build the declaration plus its internal transitions.
    pub(crate) fn build(self) -> Result<(StateDecl, Vec<Transition>), BuildError> {
        let name = self.name;
        if name.is_empty() || name == INITIAL || name == FINAL {
            return Err(BuildError::ReservedName {
                name,
                usage: "a declared state",
            });
        }

        let entry = parse_all(&self.entry, || format!("entry actions of {name}"))?;
        let exit = parse_all(&self.exit, || format!("exit actions of {name}"))?;
        let do_action = match &self.do_action {
            Some(actions) => {
                let mut parsed = parse_all(std::slice::from_ref(actions), || {
                    format!("do-action of {name}")
                })?;
                if parsed.len() > 1 {
                    return Err(BuildError::MultipleDoActions { state: name });
                }
                parsed.pop()
            }
            None => None,
        };

        let mut internal = Vec::with_capacity(self.internal.len());
        for (trigger, effect) in &self.internal {
            if trigger.is_empty() {
                return Err(BuildError::MissingTrigger {
                    state: name.clone(),
                });
            }
            let effect = parse_all(std::slice::from_ref(effect), || {
                format!("internal transition of {name} on {trigger:?}")
            })?;
            internal.push(Transition::new(
                name.clone(),
                Some(trigger.clone()),
                effect,
                Target::State(name.clone()),
                true,
            ));
        }

        let decl = StateDecl {
            name,
            entry,
            exit,
            do_action,
            deferred: self.deferred,
        };
        Ok((decl, internal))
    }
}

fn parse_all(
    lists: &[String],
    context: impl Fn() -> String,
) -> Result<Vec<ActionCall>, BuildError> {
    let mut actions = Vec::new();
    for list in lists {
        let parsed = parse_actions(list).map_err(|source| BuildError::Parse {
            context: context(),
            source,
        })?;
        actions.extend(parsed);
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_declaration_and_internal_transitions() {
        let (decl, internal) = StateBuilder::new("s1")
            .entry("start_timer('t', 100)")
            .exit("stop_timer('t')")
            .internal("tick", "count")
            .defer("later")
            .build()
            .unwrap();

        assert_eq!(decl.name(), "s1");
        assert_eq!(decl.entry()[0].name(), "start_timer");
        assert_eq!(decl.exit()[0].name(), "stop_timer");
        assert!(decl.defers("later"));
        assert_eq!(internal.len(), 1);
        assert!(internal[0].is_internal());
        assert_eq!(internal[0].trigger(), Some("tick"));
        assert_eq!(internal[0].target().candidates(), vec!["s1"]);
    }

    #[test]
    fn do_action_is_a_single_call() {
        let (decl, _) = StateBuilder::new("busy")
            .do_action("work(*)")
            .build()
            .unwrap();
        assert!(decl.do_action().is_some_and(ActionCall::uses_event_args));

        let result = StateBuilder::new("busy").do_action("a; b").build();
        assert!(matches!(result, Err(BuildError::MultipleDoActions { .. })));
    }

    #[test]
    fn reserved_names_are_rejected() {
        for name in ["initial", "final", ""] {
            let result = StateBuilder::new(name).build();
            assert!(matches!(result, Err(BuildError::ReservedName { .. })));
        }
    }

    #[test]
    fn malformed_entry_is_reported() {
        let err = StateBuilder::new("s1").entry("a(1").build().unwrap_err();
        assert!(err.to_string().contains("entry actions of s1"));
    }
}
