//! `map`: one `iteration` per source value.
//!
//! Every iteration spec depends only on its position, never on the value,
//! so growing the sources keeps the existing iterations and their state;
//! values reach the iterations through the hidden alias components.

use super::{ComponentClass, no_children, no_states};
use crate::document::{ChildSpec, ComponentSpec};
use crate::engine::error::EvalResult;
use crate::engine::replacement::ReplacementPlan;
use crate::engine::state::{REPLACEMENTS, StateDef};
use crate::engine::tracker::Tracker;
use crate::engine::value::Value;

const DEFAULT_ALIAS: &str = "v";
const DEFAULT_INDEX_ALIAS: &str = "i";

fn is_sources(spec: &ComponentSpec) -> bool {
    spec.kind.eq_ignore_ascii_case("sources")
}

fn is_template(spec: &ComponentSpec) -> bool {
    spec.kind.eq_ignore_ascii_case("template")
}

fn push_flattened(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::List(items) => out.extend(items.iter().cloned()),
        other => out.push(other),
    }
}

/// Values iterated over: the `sources` attribute, or the primary values of
/// whatever the `sources` child renders, lists flattened.
fn source_values(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let mut values = Vec::new();
    if let Some(sources) = tracker.eval_attribute("sources")? {
        match sources {
            Value::Undefined => {}
            other => push_flattened(other, &mut values),
        }
        return Ok(Value::list(values));
    }
    let this = tracker.this().clone();
    for child in tracker.static_children(&this) {
        if !tracker.class_of(&child).is_some_and(|class| class.is("sources")) {
            continue;
        }
        for source in tracker.active_children(&child)? {
            let value = tracker.primary_value(&source)?;
            push_flattened(value, &mut values);
        }
    }
    Ok(Value::list(values))
}

fn template_children(spec: &ComponentSpec) -> Vec<ChildSpec> {
    match spec.component_children().find(|child| is_template(child)) {
        Some(template) => template.children.clone(),
        None => spec
            .children
            .iter()
            .filter(|child| match child {
                ChildSpec::Component(component) => !is_sources(component),
                ChildSpec::Text(_) => true,
            })
            .cloned()
            .collect(),
    }
}

fn map_plan(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let spec = tracker.spec();
    let count = tracker
        .own("sourceValues")?
        .items()
        .map_or(0, <[Value]>::len);
    let this = tracker.this().clone();
    let alias = spec.attribute("alias").unwrap_or(DEFAULT_ALIAS);
    let index_alias = spec.attribute("indexAlias").unwrap_or(DEFAULT_INDEX_ALIAS);
    let template = template_children(&spec);

    let mut plan = ReplacementPlan::new("iterations");
    for position in 1..=count {
        let mut iteration = ComponentSpec::new("iteration")
            .child(
                ComponentSpec::new("math")
                    .named(alias)
                    .attr("hide", "true")
                    .attr("value", format!("$({this}).sourceValues[{position}]")),
            )
            .child(
                ComponentSpec::new("number")
                    .named(index_alias)
                    .attr("hide", "true")
                    .attr("value", position.to_string()),
            );
        iteration.children.extend(template.iter().cloned());
        plan.push(iteration);
    }
    let names = spec.list_attribute("assignNames");
    Ok(plan.assign_names(&names).into_value())
}

fn map_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::derived("sourceValues", source_values),
        StateDef::derived(REPLACEMENTS, map_plan),
    ]
}

pub static MAP: ComponentClass = ComponentClass {
    name: "map",
    states: map_states,
    primary_state: None,
    actions: &[],
    default_action: None,
    composite: true,
    opens_namespace: false,
    keeps_child: is_sources,
};

/// Holds the components a `map` iterates over.
pub static SOURCES: ComponentClass = ComponentClass {
    name: "sources",
    states: no_states,
    primary_state: None,
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_defaults_to_non_source_children() {
        let spec = ComponentSpec::new("map")
            .child(ComponentSpec::new("sources").child(ComponentSpec::new("number")))
            .child(ComponentSpec::new("p").text("$v"));
        let template = template_children(&spec);
        assert_eq!(template.len(), 1);
        assert!(matches!(&template[0], ChildSpec::Component(p) if p.kind == "p"));

        let spec = ComponentSpec::new("map")
            .child(ComponentSpec::new("template").text("x is $v"));
        assert_eq!(template_children(&spec), vec![ChildSpec::Text("x is $v".into())]);
    }
}
