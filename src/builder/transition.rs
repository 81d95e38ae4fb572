//! Builder for transition declarations.

use crate::builder::error::BuildError;
use crate::core::{parse_actions, Kwargs, Target, Transition, FINAL, INITIAL};
use serde_json::Value;
use std::sync::Arc;

/// Builder for one transition.
///
/// ```
/// use runstate::builder::TransitionBuilder;
///
/// let transition = TransitionBuilder::new()
///     .from("idle")
///     .on("start")
///     .to("busy")
///     .effect("start_timer('t', 1000); log(*)")
///     .build()
///     .unwrap();
///
/// assert_eq!(transition.trigger(), Some("start"));
/// assert_eq!(transition.effect().len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct TransitionBuilder {
    source: Option<String>,
    trigger: Option<String>,
    target: Option<Target>,
    effect: Vec<String>,
    internal: bool,
}

impl TransitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make this the machine's initial transition.
    pub fn initial(self) -> Self {
        self.from(INITIAL)
    }

    /// Set the source state (required unless `initial`).
    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.source = Some(state.into());
        self
    }

    /// Set the trigger (required unless `initial`).
    pub fn on(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Set a fixed target state. `"final"` terminates the machine.
    pub fn to(mut self, state: impl Into<String>) -> Self {
        self.target = Some(Target::State(state.into()));
        self
    }

    /// Compute the target when the transition fires.
    ///
    /// `decide` receives the event's arguments and must return one of
    /// `candidates`; any other name leaves the machine in the source state.
    pub fn decide<I, S, F>(mut self, candidates: I, decide: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[Value], &Kwargs) -> String + Send + Sync + 'static,
    {
        self.target = Some(Target::Decision {
            candidates: candidates.into_iter().map(Into::into).collect(),
            decide: Arc::new(decide),
        });
        self
    }

    /// Append effect actions, written in the action-list syntax.
    pub fn effect(mut self, actions: impl Into<String>) -> Self {
        self.effect.push(actions.into());
        self
    }

    /// Run the effect without leaving the source state. Entry and exit
    /// actions do not run. Combining this with a target is an error.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Validate and build the transition.
    pub fn build(self) -> Result<Transition, BuildError> {
        let source = self.source.ok_or(BuildError::MissingSource)?;
        if source.is_empty() {
            return Err(BuildError::MissingSource);
        }
        if source == FINAL {
            return Err(BuildError::ReservedName {
                name: source,
                usage: "a transition source",
            });
        }

        let initial = source == INITIAL;
        let trigger = match (initial, self.trigger) {
            (true, Some(trigger)) => return Err(BuildError::TriggerOnInitial { trigger }),
            (true, None) => None,
            (false, Some(trigger)) if !trigger.is_empty() => Some(trigger),
            (false, _) => return Err(BuildError::MissingTrigger { state: source }),
        };
        let label = trigger.clone().unwrap_or_default();

        let target = if self.internal {
            if initial {
                return Err(BuildError::InternalInitial);
            }
            if self.target.is_some() {
                return Err(BuildError::TargetOnInternal {
                    state: source,
                    trigger: label,
                });
            }
            Target::State(source.clone())
        } else {
            let target = self.target.ok_or_else(|| BuildError::MissingTarget {
                state: source.clone(),
                trigger: label.clone(),
            })?;
            let candidates = target.candidates();
            if candidates.is_empty() {
                return Err(BuildError::EmptyCandidates {
                    state: source,
                    trigger: label,
                });
            }
            if let Some(invalid) = candidates
                .iter()
                .find(|name| name.is_empty() || **name == INITIAL)
            {
                return Err(BuildError::InvalidTarget {
                    target: invalid.to_string(),
                    state: source,
                    trigger: label,
                });
            }
            target
        };

        let context = match &trigger {
            Some(trigger) => format!("effect of transition from {source} on {trigger:?}"),
            None => "effect of the initial transition".to_string(),
        };
        let mut effect = Vec::new();
        for actions in &self.effect {
            let parsed = parse_actions(actions).map_err(|source| BuildError::Parse {
                context: context.clone(),
                source,
            })?;
            effect.extend(parsed);
        }

        Ok(Transition::new(source, trigger, effect, target, self.internal))
    }
}
