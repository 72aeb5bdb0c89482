//! Mirrors: `copy` and `collect`.
//!
//! A mirror never clones values. It instantiates linked components whose
//! states read through to the originals, so edits on either side are the
//! same edit. The mirror of a composite mirrors that composite's current
//! roots; each nested composite root gets its own inner `copy`, which is
//! how copies of copies keep following structural changes.

use super::{ComponentClass, no_children};
use crate::document::{ComponentSpec, Link};
use crate::engine::address::{ComponentId, StateKey};
use crate::engine::error::{EvalIssue, EvalResult};
use crate::engine::replacement::ReplacementPlan;
use crate::engine::resolver::collect_by_type;
use crate::engine::state::{REPLACEMENTS, StateDef};
use crate::engine::tracker::Tracker;
use crate::engine::value::{Value, format_number};
use crate::expr::eval::pick;
use crate::expr::{Expr, RefPath, Reference, evaluate, parse_reference};

/// Holder type for a projected state value.
fn holder_kind(value: &Value) -> &'static str {
    match value {
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Text(_) => "text",
        _ => "math",
    }
}

/// Linked stand-in for `id` and its authored children.
fn linked_spec(tracker: &Tracker<'_>, id: &ComponentId) -> Option<ComponentSpec> {
    let class = tracker.class_of(id)?;
    if class.composite {
        return Some(ComponentSpec::new("copy").attr("target", id.as_str()));
    }
    let mut spec = ComponentSpec::new(class.name).linked(Link::Component(id.clone()));
    for child in tracker.static_children(id) {
        if let Some(child) = linked_spec(tracker, &child) {
            spec = spec.child(child);
        }
    }
    Some(spec)
}

/// Specs mirroring `target` as rendered: its linked self, or linked copies
/// of its current roots when it is a composite.
fn mirror_specs(tracker: &mut Tracker<'_>, target: &ComponentId) -> EvalResult<Vec<ComponentSpec>> {
    let composite = tracker.class_of(target).is_some_and(|class| class.composite);
    let roots = if composite {
        tracker.replacement_roots(target)?
    } else {
        vec![target.clone()]
    };
    Ok(roots
        .iter()
        .filter_map(|root| linked_spec(&*tracker, root))
        .collect())
}

/// Holder linked to `target.prop`, or indexed into it when `indices` apply.
fn projection_spec(
    tracker: &mut Tracker<'_>,
    target: &ComponentId,
    prop: &str,
    indices: &[f64],
) -> EvalResult<ComponentSpec> {
    let mut value = tracker.state(target, prop)?;
    if indices.is_empty() {
        let key = StateKey::new(target.clone(), prop);
        return Ok(ComponentSpec::new(holder_kind(&value)).linked(Link::State(key)));
    }
    let mut source = format!("$({target}).{prop}");
    for index in indices {
        value = value.index(*index);
        source.push_str(&format!("[{}]", format_number(*index)));
    }
    Ok(ComponentSpec::new(holder_kind(&value)).attr("value", source))
}

fn copy_reference(spec: &ComponentSpec) -> Option<Reference> {
    if let Some(source) = spec.attribute("source") {
        return parse_reference(source).ok();
    }
    let path = RefPath::parse(spec.attribute("target")?)?;
    Some(Reference {
        path,
        component_indices: Vec::new(),
        prop: spec.attribute("prop").map(Into::into),
        prop_indices: Vec::new(),
    })
}

fn evaluate_indices(
    tracker: &mut Tracker<'_>,
    indices: &[Expr],
) -> EvalResult<Option<Vec<f64>>> {
    let namespace = tracker.namespace();
    let mut out = Vec::with_capacity(indices.len());
    for index in indices {
        match evaluate(index, &namespace, tracker)?.as_number() {
            Some(position) => out.push(position),
            None => return Ok(None),
        }
    }
    Ok(Some(out))
}

fn copy_plan(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let spec = tracker.spec();
    let Some(reference) = copy_reference(&spec) else {
        return Err(EvalIssue::Failed(
            "copy needs a `source` or `target`".to_string(),
        ));
    };
    let namespace = tracker.namespace();
    let mut target = tracker.resolve(&reference.path, &namespace)?;
    let Some(component_indices) = evaluate_indices(tracker, &reference.component_indices)? else {
        return Ok(ReplacementPlan::new("none").into_value());
    };
    for position in component_indices {
        let children = tracker.active_children(&target)?;
        match pick(&children, position) {
            Some(child) => target = child.clone(),
            None => return Ok(ReplacementPlan::new("none").into_value()),
        }
    }

    let mut plan = ReplacementPlan::new(target.as_str());
    match &reference.prop {
        Some(prop) => {
            let Some(prop_indices) = evaluate_indices(tracker, &reference.prop_indices)? else {
                return Ok(ReplacementPlan::new("none").into_value());
            };
            plan.push(projection_spec(tracker, &target, prop, &prop_indices)?);
        }
        None => plan.extend(mirror_specs(tracker, &target)?),
    }
    let names = spec.list_attribute("assignNames");
    Ok(plan.assign_names(&names).into_value())
}

fn copy_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![StateDef::derived(REPLACEMENTS, copy_plan)]
}

/// `source="$p.x"` or `target="p"` with an optional `prop`.
pub static COPY: ComponentClass = ComponentClass {
    name: "copy",
    states: copy_states,
    primary_state: None,
    actions: &[],
    default_action: None,
    composite: true,
    opens_namespace: false,
    keeps_child: no_children,
};

fn collect_plan(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let spec = tracker.spec();
    let Some(path) = spec.attribute("target").and_then(RefPath::parse) else {
        return Err(EvalIssue::Failed(
            "collect needs a `target`".to_string(),
        ));
    };
    let namespace = tracker.namespace();
    let target = tracker.resolve(&path, &namespace)?;
    let types = spec.list_attribute("componentTypes");
    let this = tracker.this().clone();
    let mut matches = collect_by_type(tracker, &target, &types, Some(&this))?;
    if let Some(limit) = tracker.eval_attribute("maxNumber")?.and_then(|value| value.as_number()) {
        matches.truncate(limit.max(0.0) as usize);
    }

    let mut plan = ReplacementPlan::new(format!("collect:{target}"));
    match spec.attribute("prop") {
        Some(prop) => {
            for found in &matches {
                if tracker.has_state(found, prop) {
                    plan.push(projection_spec(tracker, found, prop, &[])?);
                }
            }
        }
        None => {
            for found in &matches {
                if let Some(linked) = linked_spec(tracker, found) {
                    plan.push(linked);
                }
            }
        }
    }
    let names = spec.list_attribute("assignNames");
    Ok(plan.assign_names(&names).into_value())
}

fn collect_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![StateDef::derived(REPLACEMENTS, collect_plan)]
}

/// Linked copies of the descendants of `target` matching `componentTypes`,
/// in document order, or a holder per match when `prop` is given.
pub static COLLECT: ComponentClass = ComponentClass {
    name: "collect",
    states: collect_states,
    primary_state: None,
    actions: &[],
    default_action: None,
    composite: true,
    opens_namespace: false,
    keeps_child: no_children,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_reference_forms() {
        let spec = ComponentSpec::new("copy").attr("source", "$p.x");
        let reference = copy_reference(&spec).unwrap();
        assert_eq!(reference.path.to_string(), "p");
        assert_eq!(reference.prop.as_deref(), Some("x"));

        let spec = ComponentSpec::new("copy").attr("target", "/a/b").attr("prop", "value");
        let reference = copy_reference(&spec).unwrap();
        assert!(reference.path.absolute);
        assert_eq!(reference.prop.as_deref(), Some("value"));

        assert!(copy_reference(&ComponentSpec::new("copy")).is_none());
    }

    #[test]
    fn holders_follow_value_kind() {
        assert_eq!(holder_kind(&Value::Number(1.0)), "number");
        assert_eq!(holder_kind(&Value::text("a")), "text");
        assert_eq!(holder_kind(&Value::tuple([Value::Number(1.0)])), "math");
    }
}
