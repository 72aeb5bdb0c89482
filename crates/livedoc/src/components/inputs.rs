//! Components a learner edits directly. Their values are essential: the
//! rule only supplies the initial value, actions store the rest.

use super::{ComponentClass, no_children, value_text};
use crate::document::ComponentSpec;
use crate::engine::action::{ActionContext, ActionDef, ActionEffect};
use crate::engine::error::{EvalResult, Rejection};
use crate::engine::state::StateDef;
use crate::engine::tracker::Tracker;
use crate::engine::value::Value;

fn number_prefill(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(tracker.eval_attribute("prefill")?.unwrap_or_default().to_number())
}

fn text_prefill(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(match tracker.attribute("prefill") {
        Some(prefill) => Value::text(prefill),
        None => Value::text(""),
    })
}

fn boolean_prefill(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(match tracker.eval_attribute("prefill")?.map(|value| value.to_bool()) {
        Some(Value::Bool(flag)) => Value::Bool(flag),
        _ => Value::Bool(false),
    })
}

fn number_input_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::essential("value", number_prefill),
        StateDef::derived("text", value_text),
    ]
}

fn update_number(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let value = context.require_arg("value")?.to_number();
    Ok(ActionEffect::write(context.own_key("value"), value))
}

pub static NUMBER_INPUT: ComponentClass = ComponentClass {
    name: "numberInput",
    states: number_input_states,
    primary_state: Some("value"),
    actions: &[ActionDef {
        name: "updateValue",
        handler: update_number,
    }],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn text_input_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::essential("value", text_prefill),
        StateDef::derived("text", value_text),
    ]
}

fn update_text(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let value = context.require_arg("value")?.to_display_string();
    Ok(ActionEffect::write(context.own_key("value"), Value::text(value)))
}

pub static TEXT_INPUT: ComponentClass = ComponentClass {
    name: "textInput",
    states: text_input_states,
    primary_state: Some("value"),
    actions: &[ActionDef {
        name: "updateValue",
        handler: update_text,
    }],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn boolean_input_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::essential("value", boolean_prefill),
        StateDef::derived("text", value_text),
    ]
}

fn update_boolean(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let value = context.require_arg("value")?.to_bool();
    match value {
        Value::Bool(flag) => Ok(ActionEffect::write(context.own_key("value"), Value::Bool(flag))),
        other => Err(Rejection::HandlerFailed(format!(
            "expected a boolean, got {}",
            other.kind_name()
        ))),
    }
}

fn toggle(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let current = context.own("value").truthy();
    Ok(ActionEffect::write(context.own_key("value"), Value::Bool(!current)))
}

pub static BOOLEAN_INPUT: ComponentClass = ComponentClass {
    name: "booleanInput",
    states: boolean_input_states,
    primary_state: Some("value"),
    actions: &[
        ActionDef {
            name: "updateBoolean",
            handler: update_boolean,
        },
        ActionDef {
            name: "toggle",
            handler: toggle,
        },
    ],
    default_action: Some("toggle"),
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

/// Initial coordinates from `x`/`y`, or from a `coords` tuple expression.
fn point_coords(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    if let Some(coords) = tracker.eval_attribute("coords")? {
        return Ok(coords);
    }
    let x = tracker.number_attribute("x", 0.0)?;
    let y = tracker.number_attribute("y", 0.0)?;
    Ok(Value::tuple([x, y]))
}

fn point_x(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(tracker.own("coords")?.index(1.0))
}

fn point_y(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(tracker.own("coords")?.index(2.0))
}

fn point_text(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(Value::text(tracker.own("coords")?.to_display_string()))
}

fn point_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::essential("coords", point_coords),
        StateDef::derived("x", point_x),
        StateDef::derived("y", point_y),
        StateDef::derived("text", point_text),
    ]
}

fn coordinate(value: Option<&Value>, name: &str, current: Value) -> Result<Value, Rejection> {
    match value.map(Value::to_number) {
        Some(Value::Number(number)) => Ok(Value::Number(number)),
        Some(_) => Err(Rejection::HandlerFailed(format!("`{name}` is not a number"))),
        None => Ok(current),
    }
}

/// Moves the point; a missing coordinate keeps its current value.
fn move_point(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let current = context.own("coords");
    let x = coordinate(context.arg("x"), "x", current.index(1.0))?;
    let y = coordinate(context.arg("y"), "y", current.index(2.0))?;
    Ok(ActionEffect::write(context.own_key("coords"), Value::tuple([x, y])))
}

pub static POINT: ComponentClass = ComponentClass {
    name: "point",
    states: point_states,
    primary_state: Some("coords"),
    actions: &[ActionDef {
        name: "movePoint",
        handler: move_point,
    }],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};
