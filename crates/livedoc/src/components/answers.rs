//! Generic credit aggregation. Grading rules beyond "an award's condition
//! holds" belong to the host.

use super::{ComponentClass, no_children};
use crate::document::ComponentSpec;
use crate::engine::action::{ActionContext, ActionDef, ActionEffect, StateWrite};
use crate::engine::error::{EvalResult, Rejection};
use crate::engine::resolver::collect_prop;
use crate::engine::state::StateDef;
use crate::engine::tracker::Tracker;
use crate::engine::value::Value;

fn award_fired(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(Value::Bool(
        tracker.eval_attribute("condition")?.is_some_and(|value| value.truthy()),
    ))
}

fn award_credit(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    if !tracker.own("fired")?.truthy() {
        return Ok(Value::Number(0.0));
    }
    let credit = tracker.number_attribute("credit", 1.0)?;
    Ok(match credit.as_number() {
        Some(credit) => Value::Number(credit.clamp(0.0, 1.0)),
        None => Value::Number(0.0),
    })
}

fn award_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::derived("fired", award_fired),
        StateDef::derived("credit", award_credit),
    ]
}

pub static AWARD: ComponentClass = ComponentClass {
    name: "award",
    states: award_states,
    primary_state: Some("credit"),
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

/// Best credit among the awards inside the answer.
fn answer_credit(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let this = tracker.this().clone();
    let credits = collect_prop(tracker, &this, &["award".to_string()], "credit", None)?;
    let best = credits
        .iter()
        .filter_map(Value::as_number)
        .fold(0.0_f64, f64::max);
    Ok(Value::Number(best))
}

fn zero(_: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(Value::Number(0.0))
}

fn not_submitted(_: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(Value::Bool(false))
}

fn answer_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::derived("credit", answer_credit),
        StateDef::essential("creditAchieved", zero),
        StateDef::essential("numSubmissions", zero),
        StateDef::essential("submitted", not_submitted),
    ]
}

/// Records the current credit as achieved.
fn submit_answer(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let credit = context.own("credit").as_number().unwrap_or(0.0);
    let submissions = context.own("numSubmissions").as_number().unwrap_or(0.0);
    Ok(ActionEffect {
        writes: vec![
            StateWrite {
                key: context.own_key("creditAchieved"),
                value: Value::Number(credit),
            },
            StateWrite {
                key: context.own_key("numSubmissions"),
                value: Value::Number(submissions + 1.0),
            },
            StateWrite {
                key: context.own_key("submitted"),
                value: Value::Bool(true),
            },
        ],
        follow_ups: Vec::new(),
    })
}

pub static ANSWER: ComponentClass = ComponentClass {
    name: "answer",
    states: answer_states,
    primary_state: Some("creditAchieved"),
    actions: &[ActionDef {
        name: "submitAnswer",
        handler: submit_answer,
    }],
    default_action: Some("submitAnswer"),
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};
