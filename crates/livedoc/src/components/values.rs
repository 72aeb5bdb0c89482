//! Value holders: numbers, booleans, math, sequences and the regression
//! line fitted through a set of points.

use super::{ComponentClass, children_value, no_children, value_text};
use crate::document::ComponentSpec;
use crate::engine::error::{EvalIssue, EvalResult};
use crate::engine::state::StateDef;
use crate::engine::tracker::Tracker;
use crate::engine::value::{UNDEFINED_TEXT, Value, format_number};

/// Longest sequence a `sequence` component produces.
pub const MAX_SEQUENCE_LENGTH: usize = 10_000;

const FIT: &str = "__fit";

/// Evaluates content text such as `2 + 1` built from a holder's children.
/// Text that is not an expression reads as Undefined.
fn evaluate_text(tracker: &mut Tracker<'_>, text: &str) -> EvalResult<Value> {
    let text = text.trim();
    if text.is_empty() || text.contains(UNDEFINED_TEXT) {
        return Ok(Value::Undefined);
    }
    let namespace = tracker.namespace();
    match tracker.eval_source_in(text, &namespace) {
        Err(EvalIssue::Failed(_)) => Ok(Value::Undefined),
        other => other,
    }
}

fn content_value(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    match children_value(tracker)? {
        Value::Text(text) => evaluate_text(tracker, &text),
        other => Ok(other),
    }
}

fn number_from_attribute(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(tracker.eval_attribute("value")?.unwrap_or_default().to_number())
}

fn number_from_children(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(content_value(tracker)?.to_number())
}

fn number_states(spec: &ComponentSpec) -> Vec<StateDef> {
    let value = match spec.attribute("value") {
        Some(_) => StateDef::derived("value", number_from_attribute),
        None => StateDef::derived("value", number_from_children),
    };
    vec![value, StateDef::derived("text", value_text)]
}

pub static NUMBER: ComponentClass = ComponentClass {
    name: "number",
    states: number_states,
    primary_state: Some("value"),
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn boolean_from_attribute(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(tracker.eval_attribute("value")?.unwrap_or_default().to_bool())
}

fn boolean_from_children(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    match children_value(tracker)? {
        Value::Text(text) => match Value::Text(text.clone()).to_bool() {
            Value::Undefined => Ok(evaluate_text(tracker, &text)?.to_bool()),
            flag => Ok(flag),
        },
        other => Ok(other.to_bool()),
    }
}

fn boolean_states(spec: &ComponentSpec) -> Vec<StateDef> {
    let value = match spec.attribute("value") {
        Some(_) => StateDef::derived("value", boolean_from_attribute),
        None => StateDef::derived("value", boolean_from_children),
    };
    vec![value, StateDef::derived("text", value_text)]
}

pub static BOOLEAN: ComponentClass = ComponentClass {
    name: "boolean",
    states: boolean_states,
    primary_state: Some("value"),
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn math_states(spec: &ComponentSpec) -> Vec<StateDef> {
    let value = match spec.attribute("value") {
        Some(source) => StateDef::expression("value", source),
        None => StateDef::derived("value", content_value),
    };
    vec![value, StateDef::derived("text", value_text)]
}

/// Untyped expression value; tuples and lists pass through unchanged.
pub static MATH: ComponentClass = ComponentClass {
    name: "math",
    states: math_states,
    primary_state: Some("value"),
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn sequence_values(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let from = tracker.number_attribute("from", 1.0)?.as_number();
    let step = tracker.number_attribute("step", 1.0)?.as_number();
    let (Some(from), Some(step)) = (from, step) else {
        return Ok(Value::Undefined);
    };
    let length = match tracker.eval_attribute("length")? {
        Some(length) => length.to_number().as_number(),
        None => tracker
            .eval_attribute("to")?
            .and_then(|to| to.to_number().as_number())
            .map(|to| {
                if step == 0.0 {
                    1.0
                } else {
                    ((to - from) / step + 1e-10).floor() + 1.0
                }
            }),
    };
    let Some(length) = length.filter(|length| length.is_finite()) else {
        return Ok(Value::Undefined);
    };
    let count = (length.max(0.0) as usize).min(MAX_SEQUENCE_LENGTH);
    Ok(Value::list(
        (0..count).map(|index| Value::Number(from + step * index as f64)),
    ))
}

fn sequence_length(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let values = tracker.own("values")?;
    Ok(match values.items() {
        Some(items) => Value::Number(items.len() as f64),
        None => Value::Undefined,
    })
}

fn sequence_text(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(Value::text(tracker.own("values")?.to_display_string()))
}

fn sequence_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::derived("values", sequence_values),
        StateDef::derived("length", sequence_length),
        StateDef::derived("text", sequence_text),
    ]
}

/// Arithmetic progression from `from` by `step`, sized by `length` or `to`.
pub static SEQUENCE: ComponentClass = ComponentClass {
    name: "sequence",
    states: sequence_states,
    primary_state: Some("values"),
    actions: &[],
    default_action: None,
    composite: false,
    opens_namespace: false,
    keeps_child: no_children,
};

fn regression_points(tracker: &mut Tracker<'_>) -> EvalResult<Vec<(f64, f64)>> {
    let raw: Vec<Value> = match tracker.eval_attribute("data")? {
        Some(data) => data.items().map(<[Value]>::to_vec).unwrap_or_default(),
        None => {
            let this = tracker.this().clone();
            let mut points = Vec::new();
            for child in tracker.active_children(&this)? {
                let value = if tracker.has_state(&child, "coords") {
                    tracker.state(&child, "coords")?
                } else {
                    tracker.primary_value(&child)?
                };
                points.push(value);
            }
            points
        }
    };
    Ok(raw
        .iter()
        .filter_map(|point| match point.items()? {
            [x, y] => Some((x.as_number()?, y.as_number()?)),
            _ => None,
        })
        .collect())
}

/// Least-squares line as `(slope, intercept)`.
fn regression_fit(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let points = regression_points(tracker)?;
    Ok(match least_squares(&points) {
        Some((slope, intercept)) => {
            Value::tuple([Value::Number(slope), Value::Number(intercept)])
        }
        None => Value::Undefined,
    })
}

pub(crate) fn least_squares(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

fn regression_slope(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(tracker.own(FIT)?.index(1.0))
}

fn regression_intercept(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    Ok(tracker.own(FIT)?.index(2.0))
}

fn regression_equation(tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    let fit = tracker.own(FIT)?;
    Ok(match (fit.index(1.0).as_number(), fit.index(2.0).as_number()) {
        (Some(slope), Some(intercept)) => Value::text(format_line(slope, intercept)),
        _ => Value::Undefined,
    })
}

/// `y = -0.5x + 4.5`, `y = x`, `y = 3`.
pub(crate) fn format_line(slope: f64, intercept: f64) -> String {
    let mut line = String::from("y = ");
    let slope_text = format_number(slope);
    let flat = slope_text == "0";
    match slope_text.as_str() {
        "0" => {}
        "1" => line.push('x'),
        "-1" => line.push_str("-x"),
        other => {
            line.push_str(other);
            line.push('x');
        }
    }
    let intercept_text = format_number(intercept);
    if flat {
        line.push_str(&intercept_text);
    } else if intercept_text != "0" {
        let sign = if intercept < 0.0 { '-' } else { '+' };
        line.push_str(&format!(" {sign} {}", format_number(intercept.abs())));
    }
    line
}

fn regression_states(_: &ComponentSpec) -> Vec<StateDef> {
    vec![
        StateDef::derived(FIT, regression_fit),
        StateDef::derived("slope", regression_slope),
        StateDef::derived("intercept", regression_intercept),
        StateDef::derived("equation", regression_equation),
        StateDef::derived("text", regression_equation),
    ]
}

/// Line of best fit through the points among its children, or through the
/// list of `(x, y)` tuples in its `data` attribute.
pub static REGRESSION: ComponentClass = ComponentClass {
    name: "regression",
    states: regression_states,
    primary_state: Some("equation"),
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
    fn fits_the_worked_example() {
        let first = least_squares(&[(1.0, 2.0), (1.0, 6.0), (7.0, 3.0), (7.0, -1.0)]).unwrap();
        assert_eq!(format_line(first.0, first.1), "y = -0.5x + 4.5");

        let second = least_squares(&[(-5.0, -8.0), (3.0, 5.0), (-5.0, -10.0), (3.0, 9.0)]).unwrap();
        assert_eq!(format_line(second.0, second.1), "y = 2x + 1");
    }

    #[test]
    fn degenerate_fits() {
        assert_eq!(least_squares(&[(1.0, 1.0)]), None);
        assert_eq!(least_squares(&[(2.0, 1.0), (2.0, 5.0)]), None);
    }

    #[test]
    fn line_formatting() {
        assert_eq!(format_line(1.0, 0.0), "y = x");
        assert_eq!(format_line(-1.0, -2.0), "y = -x - 2");
        assert_eq!(format_line(0.0, 3.0), "y = 3");
    }
}
