//! Branching composites.
//!
//! The plan key names the branch that won, so switching branches always
//! rebuilds: state made inside a branch does not survive leaving it.

use super::{ComponentClass, no_children};
use crate::document::{ComponentSpec, expand_children};
use crate::engine::error::EvalResult;
use crate::engine::replacement::ReplacementPlan;
use crate::engine::state::{REPLACEMENTS, StateDef};
use crate::engine::tracker::Tracker;
use crate::engine::value::Value;

fn condition_holds(tracker: &mut Tracker<'_>, source: &str) -> EvalResult<bool> {
    let namespace = tracker.child_namespace();
    Ok(tracker.eval_source_in(source, &namespace)?.truthy())
}

/// First `case` whose condition holds, else the `else` branch. With a
/// `condition` attribute the component's own children form the single case.
fn branch_plan(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let spec = tracker.spec();
    let mut plan = ReplacementPlan::new("none");

    if let Some(condition) = spec.attribute("condition") {
        if condition_holds(tracker, condition)? {
            plan = ReplacementPlan::new("branch0");
            plan.extend(expand_children(&spec.children));
        }
    } else {
        for (index, branch) in spec.component_children().enumerate() {
            let taken = if branch.kind.eq_ignore_ascii_case("else") {
                true
            } else if branch.kind.eq_ignore_ascii_case("case") {
                match branch.attribute("condition") {
                    Some(condition) => condition_holds(tracker, condition)?,
                    None => false,
                }
            } else {
                false
            };
            if taken {
                plan = ReplacementPlan::new(format!("branch{index}"));
                plan.extend(expand_children(&branch.children));
                break;
            }
        }
    }

    let names = spec.list_attribute("assignNames");
    Ok(plan.assign_names(&names).into_value())
}

fn conditional_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![StateDef::derived(REPLACEMENTS, branch_plan)]
}

pub static CONDITIONAL_CONTENT: ComponentClass = ComponentClass {
    name: "conditionalContent",
    states: conditional_states,
    primary_state: None,
    actions: &[],
    default_action: None,
    composite: true,
    opens_namespace: false,
    keeps_child: no_children,
};

/// Shown only while `condition` holds and the document shows feedback.
fn feedback_plan(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let spec = tracker.spec();
    if !tracker.flags().show_feedback {
        return Ok(ReplacementPlan::new("hidden").into_value());
    }
    let shown = match spec.attribute("condition") {
        Some(condition) => condition_holds(tracker, condition)?,
        None => false,
    };
    let mut plan = ReplacementPlan::new(if shown { "shown" } else { "hidden" });
    if shown {
        plan.extend(expand_children(&spec.children));
    }
    Ok(plan.into_value())
}

fn feedback_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![StateDef::derived(REPLACEMENTS, feedback_plan)]
}

pub static FEEDBACK: ComponentClass = ComponentClass {
    name: "feedback",
    states: feedback_states,
    primary_state: None,
    actions: &[],
    default_action: None,
    composite: true,
    opens_namespace: false,
    keeps_child: no_children,
};
