use serde::Serialize;
use thiserror::Error;

use super::address::{ComponentId, StateKey};
use super::coordinator::Phase;

/// Errors that abort a cycle or construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("circular dependency: {}", format_chain(.chain))]
    CircularDependency { chain: Vec<StateKey> },
    #[error("component id `{id}` is already in use")]
    DuplicateName { id: ComponentId },
    #[error("invalid component name `{name}`")]
    InvalidName { name: String },
    #[error("unknown component type `{kind}`")]
    UnknownComponentType { kind: String },
    #[error("more than {limit} chained actions in one cycle")]
    ChainLimitExceeded { limit: usize },
    #[error("document structure did not settle within {limit} passes")]
    PassLimitExceeded { limit: usize },
    #[error("engine is not settled (phase {phase:?})")]
    NotSettled { phase: Phase },
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn format_chain(chain: &[StateKey]) -> String {
    let steps: Vec<String> = chain.iter().map(ToString::to_string).collect();
    steps.join(" -> ")
}

/// Problems that are reported and contained; the cycle still settles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    #[error("unresolved reference `{path}` from {from}")]
    UnresolvedReference { from: ComponentId, path: String },
    #[error("`{target}` has no action `{action}`")]
    UnknownAction { target: String, action: String },
    #[error("replacement of {composite} kept its previous content: {reason}")]
    PartialReplacementFailure { composite: ComponentId, reason: String },
    #[error("{key}: {message}")]
    InvalidExpression { key: StateKey, message: String },
}

/// Why an action request was not carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    #[error("target is disabled")]
    DisabledTarget,
    #[error("document is read-only")]
    ReadOnlyRejected,
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("target `{0}` not found")]
    UnresolvedTarget(String),
    #[error("cannot write {key}: {reason}")]
    InvalidWrite { key: String, reason: String },
    #[error("action failed: {0}")]
    HandlerFailed(String),
}

/// Outcome of evaluating a single state rule.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalIssue {
    /// A reference did not resolve or an input is not ready; retried later.
    Pending,
    /// The rule reached a state that is already being computed.
    Circular(Vec<StateKey>),
    /// The rule cannot produce a value; the state becomes Undefined.
    Failed(String),
}

pub type EvalResult<T> = Result<T, EvalIssue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_message_lists_chain() {
        let error = EngineError::CircularDependency {
            chain: vec![
                StateKey::new(ComponentId::from("/a"), "value"),
                StateKey::new(ComponentId::from("/b"), "value"),
                StateKey::new(ComponentId::from("/a"), "value"),
            ],
        };
        assert_eq!(
            error.to_string(),
            "circular dependency: /a.value -> /b.value -> /a.value"
        );
    }
}
