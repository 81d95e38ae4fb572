//! Transition and state declarations.
//!
//! Both are immutable once a machine is built. They are exposed read-only so
//! that external tools can render a machine as a graph or translate it into a
//! verification model.

use crate::core::action::ActionCall;
use crate::core::event::Kwargs;
use crate::core::state::INITIAL;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Decision function of a compound transition. Receives the event's
/// positional and keyword arguments and returns the name of the target state.
pub type DecisionFn = Arc<dyn Fn(&[Value], &Kwargs) -> String + Send + Sync>;

/// Where a transition leads.
#[derive(Clone)]
pub enum Target {
    /// A fixed target state.
    State(String),

    /// A target computed at run time, restricted to a declared candidate set.
    Decision {
        candidates: Vec<String>,
        decide: DecisionFn,
    },
}

impl Target {
    /// Every state this target may lead to.
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            Self::State(name) => vec![name.as_str()],
            Self::Decision { candidates, .. } => candidates.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Decision { .. })
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(name) => f.debug_tuple("State").field(name).finish(),
            Self::Decision { candidates, .. } => f
                .debug_struct("Decision")
                .field("candidates", candidates)
                .finish_non_exhaustive(),
        }
    }
}

/// A declared transition.
#[derive(Clone, Debug)]
pub struct Transition {
    source: String,
    trigger: Option<String>,
    effect: Vec<ActionCall>,
    target: Target,
    internal: bool,
}

impl Transition {
    pub(crate) fn new(
        source: String,
        trigger: Option<String>,
        effect: Vec<ActionCall>,
        target: Target,
        internal: bool,
    ) -> Self {
        Self {
            source,
            trigger,
            effect,
            target,
            internal,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The trigger, absent only on the initial transition.
    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }

    pub fn effect(&self) -> &[ActionCall] {
        &self.effect
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Internal transitions run their effect without leaving the state.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn is_initial(&self) -> bool {
        self.source == INITIAL
    }
}

/// A declared state with its entry, exit and do actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateDecl {
    pub(crate) name: String,
    pub(crate) entry: Vec<ActionCall>,
    pub(crate) exit: Vec<ActionCall>,
    pub(crate) do_action: Option<ActionCall>,
    pub(crate) deferred: Vec<String>,
}

impl StateDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &[ActionCall] {
        &self.entry
    }

    pub fn exit(&self) -> &[ActionCall] {
        &self.exit
    }

    pub fn do_action(&self) -> Option<&ActionCall> {
        self.do_action.as_ref()
    }

    /// Triggers postponed while the machine is in this state.
    pub fn deferred(&self) -> &[String] {
        &self.deferred
    }

    pub fn defers(&self, trigger: &str) -> bool {
        self.deferred.iter().any(|t| t == trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_target_has_single_candidate() {
        let target = Target::State("s1".to_string());
        assert_eq!(target.candidates(), vec!["s1"]);
        assert!(!target.is_decision());
    }

    #[test]
    fn decision_target_lists_declared_candidates() {
        let target = Target::Decision {
            candidates: vec!["s2".to_string(), "s3".to_string()],
            decide: Arc::new(|_, _| "s2".to_string()),
        };
        assert_eq!(target.candidates(), vec!["s2", "s3"]);
        assert!(target.is_decision());
        assert!(format!("{target:?}").contains("s3"));
    }

    #[test]
    fn initial_transition_is_recognised_by_source() {
        let transition = Transition::new(
            INITIAL.to_string(),
            None,
            Vec::new(),
            Target::State("s1".to_string()),
            false,
        );
        assert!(transition.is_initial());
        assert_eq!(transition.trigger(), None);
    }

    #[test]
    fn state_reports_deferred_triggers() {
        let state = StateDecl {
            name: "s1".to_string(),
            deferred: vec!["a".to_string()],
            ..StateDecl::default()
        };
        assert!(state.defers("a"));
        assert!(!state.defers("b"));
    }
}
