//! `paginator`: every page is built once and kept; pages other than the
//! current one are withheld, so turning pages never loses their state.

use super::{ComponentClass, no_children};
use crate::document::ComponentSpec;
use crate::engine::action::{ActionContext, ActionDef, ActionEffect};
use crate::engine::error::{EvalResult, Rejection};
use crate::engine::replacement::ReplacementPlan;
use crate::engine::state::{REPLACEMENTS, StateDef};
use crate::engine::tracker::Tracker;
use crate::engine::value::Value;

fn initial_page(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    tracker.number_attribute("initialPage", 1.0)
}

fn page_count(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(Value::Number(tracker.spec().component_children().count() as f64))
}

fn clamp_page(page: f64, pages: f64) -> f64 {
    page.round().clamp(1.0, pages.max(1.0))
}

fn pages_plan(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let spec = tracker.spec();
    let pages = tracker.own("numPages")?.as_number().unwrap_or(0.0);
    let current = tracker.own("currentPage")?.as_number().unwrap_or(1.0);
    let current = clamp_page(current, pages) as usize;

    let mut plan = ReplacementPlan::new("pages");
    for (index, page) in spec.component_children().enumerate() {
        if index + 1 == current {
            plan.push(page.clone());
        } else {
            plan.push_withheld(page.clone());
        }
    }
    Ok(plan.into_value())
}

fn paginator_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::essential("currentPage", initial_page),
        StateDef::derived("numPages", page_count),
        StateDef::derived(REPLACEMENTS, pages_plan),
    ]
}

fn go_to(context: &mut ActionContext<'_>, page: f64) -> ActionEffect {
    let pages = context.own("numPages").as_number().unwrap_or(0.0);
    ActionEffect::write(
        context.own_key("currentPage"),
        Value::Number(clamp_page(page, pages)),
    )
}

fn current_page(context: &mut ActionContext<'_>) -> f64 {
    context.own("currentPage").as_number().unwrap_or(1.0)
}

fn set_page(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let Some(page) = context.require_arg("number")?.to_number().as_number() else {
        return Err(Rejection::HandlerFailed("`number` is not a number".to_string()));
    };
    Ok(go_to(context, page))
}

fn next_page(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let page = current_page(context) + 1.0;
    Ok(go_to(context, page))
}

fn previous_page(context: &mut ActionContext<'_>) -> Result<ActionEffect, Rejection> {
    let page = current_page(context) - 1.0;
    Ok(go_to(context, page))
}

pub static PAGINATOR: ComponentClass = ComponentClass {
    name: "paginator",
    states: paginator_states,
    primary_state: Some("currentPage"),
    actions: &[
        ActionDef {
            name: "setPage",
            handler: set_page,
        },
        ActionDef {
            name: "nextPage",
            handler: next_page,
        },
        ActionDef {
            name: "previousPage",
            handler: previous_page,
        },
    ],
    default_action: Some("nextPage"),
    composite: true,
    opens_namespace: false,
    keeps_child: no_children,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_clamp_to_range() {
        assert_eq!(clamp_page(0.0, 3.0), 1.0);
        assert_eq!(clamp_page(5.0, 3.0), 3.0);
        assert_eq!(clamp_page(2.0, 3.0), 2.0);
        assert_eq!(clamp_page(2.0, 0.0), 1.0);
    }
}
