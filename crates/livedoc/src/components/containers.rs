//! Structural components: documents, groupings and text runs.

use super::{ComponentClass, children_text, no_children, no_states, value_text};
use crate::document::ComponentSpec;
use crate::engine::state::StateDef;
use crate::engine::value::Value;

fn text_container(_: &ComponentSpec) -> Vec<StateDef> {
    vec![StateDef::derived("text", children_text)]
}

const fn container(name: &'static str, opens_namespace: bool) -> ComponentClass {
    ComponentClass {
        name,
        states: text_container,
        primary_state: None,
        actions: &[],
        default_action: None,
        composite: false,
        opens_namespace,
        keeps_child: no_children,
    }
}

pub static DOCUMENT: ComponentClass = container("document", false);
pub static GROUP: ComponentClass = container("group", false);
pub static SECTION: ComponentClass = container("section", false);
pub static PARAGRAPH: ComponentClass = container("p", false);
/// One instance of a map template; each gets its own namespace.
pub static ITERATION: ComponentClass = container("iteration", true);

/// Reserved slot for an assigned name that has no content yet.
pub static PLACEHOLDER: ComponentClass = ComponentClass {
    name: "placeholder",
    states: no_states,
    primary_state: None,
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn string_states(spec: &ComponentSpec) -> Vec<StateDef> {
    let literal = spec.attribute("value").unwrap_or_default();
    vec![
        StateDef::constant("value", Value::text(literal)),
        StateDef::derived("text", value_text),
    ]
}

/// Literal text run between macros.
pub static STRING: ComponentClass = ComponentClass {
    name: "string",
    states: string_states,
    primary_state: Some("value"),
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn text_states(spec: &ComponentSpec) -> Vec<StateDef> {
    let value = match spec.attribute("value") {
        Some(literal) => StateDef::constant("value", Value::text(literal)),
        None => StateDef::derived("value", children_text),
    };
    vec![value, StateDef::derived("text", value_text)]
}

pub static TEXT: ComponentClass = ComponentClass {
    name: "text",
    states: text_states,
    primary_state: Some("value"),
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};
