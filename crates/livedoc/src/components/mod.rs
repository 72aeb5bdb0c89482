//! Component vocabulary.
//!
//! Each component type is a static [`ComponentClass`]: the states it
//! declares, its actions, and whether it is a composite. New types can be
//! added with [`Registry::register`].

use std::fmt;

use rustc_hash::FxHashMap;

use crate::document::ComponentSpec;
use crate::engine::action::ActionDef;
use crate::engine::chain::TRIGGER_WHEN;
use crate::engine::error::{EvalIssue, EvalResult};
use crate::engine::state::{DISABLED, FIXED, HIDE, StateDef, TRIGGER_CONDITION};
use crate::engine::tracker::Tracker;
use crate::engine::value::Value;

pub mod actions;
pub mod answers;
pub mod conditional;
pub mod containers;
pub mod inputs;
pub mod iteration;
pub mod mirror;
pub mod paginator;
pub mod values;

pub struct ComponentClass {
    pub name: &'static str,
    pub states: fn(&ComponentSpec) -> Vec<StateDef>,
    /// State a bare `$name` reference reads.
    pub primary_state: Option<&'static str>,
    pub actions: &'static [ActionDef],
    /// Action fired by chaining bindings.
    pub default_action: Option<&'static str>,
    /// Composites are replaced by the components their plan describes.
    pub composite: bool,
    pub opens_namespace: bool,
    /// Composites only: authored children instantiated as internal children.
    pub keeps_child: fn(&ComponentSpec) -> bool,
}

impl ComponentClass {
    pub fn action(&self, name: &str) -> Option<&ActionDef> {
        self.actions
            .iter()
            .find(|action| action.name.eq_ignore_ascii_case(name))
    }

    pub fn is(&self, kind: &str) -> bool {
        self.name.eq_ignore_ascii_case(kind)
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("composite", &self.composite)
            .finish()
    }
}

pub(crate) fn no_children(_: &ComponentSpec) -> bool {
    false
}

pub(crate) fn no_states(_: &ComponentSpec) -> Vec<StateDef> {
    Vec::new()
}

/// Component types by case-insensitive name.
#[derive(Debug, Clone)]
pub struct Registry {
    classes: FxHashMap<String, &'static ComponentClass>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            classes: FxHashMap::default(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for class in [
            &containers::DOCUMENT,
            &containers::GROUP,
            &containers::SECTION,
            &containers::PARAGRAPH,
            &containers::ITERATION,
            &containers::PLACEHOLDER,
            &containers::STRING,
            &containers::TEXT,
            &values::NUMBER,
            &values::BOOLEAN,
            &values::MATH,
            &values::SEQUENCE,
            &values::REGRESSION,
            &inputs::NUMBER_INPUT,
            &inputs::TEXT_INPUT,
            &inputs::BOOLEAN_INPUT,
            &inputs::POINT,
            &answers::ANSWER,
            &answers::AWARD,
            &conditional::CONDITIONAL_CONTENT,
            &conditional::FEEDBACK,
            &iteration::MAP,
            &iteration::SOURCES,
            &mirror::COPY,
            &mirror::COLLECT,
            &paginator::PAGINATOR,
            &actions::UPDATE_VALUE,
            &actions::CALL_ACTION,
            &actions::TRIGGER_SET,
        ] {
            registry.register(class);
        }
        registry
    }

    pub fn register(&mut self, class: &'static ComponentClass) {
        self.classes.insert(class.name.to_ascii_lowercase(), class);
    }

    pub fn get(&self, kind: &str) -> Option<&'static ComponentClass> {
        self.classes.get(&kind.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// States every component carries, whatever its type.
pub(crate) fn common_states(spec: &ComponentSpec) -> Vec<StateDef> {
    let mut states = vec![StateDef::derived(HIDE, inherited_hide)];
    states.extend([DISABLED, FIXED].into_iter().map(|flag| match spec.attribute(flag) {
        Some(source) => StateDef::expression(flag, source),
        None => StateDef::constant(flag, Value::Bool(false)),
    }));
    if let Some(condition) = spec.attribute(TRIGGER_WHEN) {
        states.push(StateDef::expression(TRIGGER_CONDITION, condition));
    }
    states
}

/// Own `hide`, or any ancestor's. A pending condition does not hide.
fn inherited_hide(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let own = match tracker.eval_attribute(HIDE) {
        Ok(value) => value.is_some_and(|value| value.truthy()),
        Err(EvalIssue::Pending) => false,
        Err(issue) => return Err(issue),
    };
    if own {
        return Ok(Value::Bool(true));
    }
    let this = tracker.this().clone();
    let hidden = match tracker.parent_of(&this) {
        Some(parent) => tracker.is_hidden(&parent)?,
        None => false,
    };
    Ok(Value::Bool(hidden))
}

/// Concatenated text of the visible active children.
pub(crate) fn children_text(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let this = tracker.this().clone();
    let mut text = String::new();
    for child in tracker.visible_children(&this)? {
        text.push_str(&tracker.text_of(&child)?);
    }
    Ok(Value::text(text))
}

/// The component's `value` as display text.
pub(crate) fn value_text(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(Value::text(tracker.own("value")?.to_display_string()))
}

/// Value of a holder's children: one child gives its value, several are
/// joined as text.
pub(crate) fn children_value(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let this = tracker.this().clone();
    let children = tracker.active_children(&this)?;
    match children.as_slice() {
        [] => Ok(Value::Undefined),
        [only] => tracker.primary_value(only),
        _ => {
            let mut text = String::new();
            for child in &children {
                text.push_str(&tracker.text_of(child)?);
            }
            Ok(Value::text(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let registry = Registry::builtin();
        assert!(registry.get("numberinput").is_some());
        assert!(registry.get("NumberInput").is_some());
        assert!(registry.get("conditionalContent").is_some_and(|class| class.composite));
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn common_states_follow_attributes() {
        let spec = ComponentSpec::new("p")
            .attr("hide", "$flag")
            .attr("triggerWhen", "$n > 2");
        let states = common_states(&spec);
        let names: Vec<&str> = states.iter().map(|state| &*state.name).collect();
        assert_eq!(names, vec![HIDE, DISABLED, FIXED, TRIGGER_CONDITION]);
        assert!(!states[3].public);
    }
}
