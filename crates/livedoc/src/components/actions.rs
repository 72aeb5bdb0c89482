//! Action components: authored buttons that write state or call other
//! components' actions. They are the usual targets of chaining bindings.

use std::collections::BTreeMap;

use super::{ComponentClass, no_children, no_states};
use crate::engine::action::{ActionContext, ActionDef, ActionEffect, ActionRequest};
use crate::engine::address::ComponentId;
use crate::engine::error::Rejection;
use crate::engine::state::DISABLED;

const ARG_PREFIX: &str = "arg:";

/// Write described by an `updateValue` component: `newValue` evaluated
/// now, stored into the state its `target` names.
fn update_write(
    context: &mut ActionContext<'_>,
    component: &ComponentId,
) -> Result<ActionEffect, Rejection> {
    let target = context.attribute_of(component, "target").unwrap_or_default();
    let key = context
        .resolve_state_target(component, "target")
        .ok_or_else(|| Rejection::UnresolvedTarget(target))?;
    let value = context.eval_attribute_of(component, "newValue");
    Ok(ActionEffect::write(key, value))
}

fn update_value(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let this = context.target().clone();
    update_write(context, &this)
}

pub static UPDATE_VALUE: ComponentClass = ComponentClass {
    name: "updateValue",
    states: no_states,
    primary_state: None,
    actions: &[ActionDef {
        name: "updateValue",
        handler: update_value,
    }],
    default_action: Some("updateValue"),
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

/// Follow-up request described by a `callAction` component. Arguments come
/// from `arg:<name>` attributes, evaluated now.
fn call_request(
    context: &mut ActionContext<'_>,
    component: &ComponentId,
) -> Result<ActionRequest, Rejection> {
    let path = context.attribute_of(component, "target").unwrap_or_default();
    let target = context
        .resolve_component(component, &path)
        .ok_or_else(|| Rejection::UnresolvedTarget(path.clone()))?;
    let action = context
        .attribute_of(component, "actionName")
        .ok_or_else(|| Rejection::HandlerFailed("callAction needs an `actionName`".to_string()))?;

    let arg_names: Vec<String> = context
        .spec_of(component)
        .map(|spec| {
            spec.attributes
                .keys()
                .filter_map(|key| key.strip_prefix(ARG_PREFIX))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let mut args = BTreeMap::new();
    for name in arg_names {
        let value = context.eval_attribute_of(component, &format!("{ARG_PREFIX}{name}"));
        args.insert(name, value);
    }

    let mut request = ActionRequest::new(target.as_str(), action).internal();
    request.args = args;
    Ok(request)
}

fn call_action(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let this = context.target().clone();
    let request = call_request(context, &this)?;
    Ok(ActionEffect {
        writes: Vec::new(),
        follow_ups: vec![request],
    })
}

pub static CALL_ACTION: ComponentClass = ComponentClass {
    name: "callAction",
    states: no_states,
    primary_state: None,
    actions: &[ActionDef {
        name: "callAction",
        handler: call_action,
    }],
    default_action: Some("callAction"),
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

/// Runs every enabled `updateValue` and `callAction` child as one action:
/// all writes land in a single batch, calls follow in child order.
fn trigger_actions(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let this = context.target().clone();
    let mut effect = ActionEffect::default();
    for child in context.active_children(&this) {
        if context.value(&child, DISABLED).truthy() {
            continue;
        }
        let Some(class) = context.class_of(&child) else {
            continue;
        };
        if class.is(UPDATE_VALUE.name) {
            effect.writes.extend(update_write(context, &child)?.writes);
        } else if class.is(CALL_ACTION.name) {
            effect.follow_ups.push(call_request(context, &child)?);
        }
    }
    Ok(effect)
}

pub static TRIGGER_SET: ComponentClass = ComponentClass {
    name: "triggerSet",
    states: no_states,
    primary_state: None,
    actions: &[ActionDef {
        name: "triggerActions",
        handler: trigger_actions,
    }],
    default_action: Some("triggerActions"),
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};
