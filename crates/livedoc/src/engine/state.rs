use std::fmt;
use std::sync::Arc;

use super::address::StateKey;
use super::error::EvalResult;
use super::tracker::Tracker;
use super::value::Value;

pub const HIDE: &str = "hide";
pub const DISABLED: &str = "disabled";
pub const FIXED: &str = "fixed";
/// Plan computed by a composite, consumed by the replacement engine.
pub const REPLACEMENTS: &str = "__replacements";
/// Active replacement roots of a composite, written after each integration.
pub const STRUCTURE: &str = "__structure";
/// Value of a `triggerWhen` condition.
pub const TRIGGER_CONDITION: &str = "__triggerCondition";

/// Computes a state from other states through the tracker.
pub type Builtin = fn(&mut Tracker<'_>) -> EvalResult<Value>;

/// How a state variable gets its value.
#[derive(Clone)]
pub enum Rule {
    Constant(Value),
    /// Expression source, evaluated in the component's namespace.
    Expression(Arc<str>),
    Builtin(Builtin),
    /// Shares another component's state; writes are redirected there.
    Link(StateKey),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Expression(source) => f.debug_tuple("Expression").field(source).finish(),
            Self::Builtin(_) => f.write_str("Builtin"),
            Self::Link(key) => f.debug_tuple("Link").field(key).finish(),
        }
    }
}

/// Declaration of a state variable on a component class.
#[derive(Clone, Debug)]
pub struct StateDef {
    pub name: Arc<str>,
    pub rule: Rule,
    /// Essential: actions may store a value that overrides the rule.
    pub writable: bool,
    pub public: bool,
}

impl StateDef {
    fn new(name: &str, rule: Rule) -> Self {
        Self {
            name: name.into(),
            rule,
            writable: false,
            public: !name.starts_with("__"),
        }
    }

    pub fn derived(name: &str, builtin: Builtin) -> Self {
        Self::new(name, Rule::Builtin(builtin))
    }

    /// Writable state whose default comes from `builtin`.
    pub fn essential(name: &str, builtin: Builtin) -> Self {
        Self::new(name, Rule::Builtin(builtin)).writable()
    }

    pub fn constant(name: &str, value: Value) -> Self {
        Self::new(name, Rule::Constant(value))
    }

    pub fn expression(name: &str, source: &str) -> Self {
        Self::new(name, Rule::Expression(source.into()))
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }
}

/// Live state variable inside a component record.
#[derive(Clone, Debug)]
pub struct StateRecord {
    pub value: Value,
    pub stale: bool,
    pub rule: Rule,
    /// Value stored by an action; wins over the rule once set.
    pub stored: Option<Value>,
    pub writable: bool,
    pub public: bool,
    /// Message of the last failed evaluation.
    pub error: Option<Arc<str>>,
}

impl StateRecord {
    /// Fresh value, or `None` while the state is stale.
    pub fn current(&self) -> Option<&Value> {
        (!self.stale).then_some(&self.value)
    }
}

impl From<StateDef> for StateRecord {
    fn from(def: StateDef) -> Self {
        Self {
            value: Value::Undefined,
            stale: true,
            rule: def.rule,
            stored: None,
            writable: def.writable,
            public: def.public,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_states_are_private() {
        let def = StateDef::constant(STRUCTURE, Value::list([]));
        assert!(!def.public);
        let def = StateDef::constant("value", Value::Number(1.0));
        assert!(def.public);
        assert!(!def.writable);

        let record = StateRecord::from(def);
        assert!(record.stale);
        assert_eq!(record.current(), None);
    }
}
