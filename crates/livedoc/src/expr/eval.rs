use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr, Reference, UnaryOp};
use crate::engine::address::Namespace;
use crate::engine::error::{EvalIssue, EvalResult};
use crate::engine::tracker::Tracker;
use crate::engine::value::Value;

/// Evaluates `expr`, resolving references from `namespace`.
///
/// Every state and name probe goes through the tracker, so the caller's
/// dependency set is exactly what this evaluation consulted.
pub fn evaluate(expr: &Expr, namespace: &Namespace, tracker: &mut Tracker<'_>) -> EvalResult<Value> {
    match expr {
        Expr::Number(number) => Ok(Value::Number(*number)),
        Expr::Text(text) => Ok(Value::Text(text.clone())),
        Expr::Bool(value) => Ok(Value::Bool(*value)),
        Expr::Tuple(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, namespace, tracker))
                .collect::<EvalResult<Vec<_>>>()?;
            Ok(Value::tuple(values))
        }
        Expr::Reference(reference) => evaluate_reference(reference, namespace, tracker),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, namespace, tracker)?;
            Ok(unary(*op, &value))
        }
        Expr::Binary { op, left, right } => {
            // Both sides always run so the dependency set does not flip
            // with the left operand's value.
            let left = evaluate(left, namespace, tracker)?;
            let right = evaluate(right, namespace, tracker)?;
            Ok(binary(*op, &left, &right))
        }
        Expr::Call { function, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, namespace, tracker))
                .collect::<EvalResult<Vec<_>>>()?;
            call(function, &values)
        }
    }
}

fn evaluate_reference(
    reference: &Reference,
    namespace: &Namespace,
    tracker: &mut Tracker<'_>,
) -> EvalResult<Value> {
    let mut component = tracker.resolve(&reference.path, namespace)?;
    for index in &reference.component_indices {
        let Some(position) = evaluate(index, namespace, tracker)?.as_number() else {
            return Ok(Value::Undefined);
        };
        let children = tracker.active_children(&component)?;
        match pick(&children, position) {
            Some(child) => component = child.clone(),
            None => return Ok(Value::Undefined),
        }
    }
    let mut value = match &reference.prop {
        Some(prop) => tracker.state(&component, prop)?,
        None => tracker.primary_value(&component)?,
    };
    for index in &reference.prop_indices {
        let Some(position) = evaluate(index, namespace, tracker)?.as_number() else {
            return Ok(Value::Undefined);
        };
        value = value.index(position);
    }
    Ok(value)
}

/// 1-based pick from a list of components.
pub(crate) fn pick<T>(items: &[T], position: f64) -> Option<&T> {
    if position.fract() != 0.0 || position < 1.0 {
        return None;
    }
    items.get(position as usize - 1)
}

fn unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::Negate => match value {
            Value::Number(number) => Value::Number(-number),
            Value::Tuple(items) => Value::tuple(items.iter().map(|item| unary(op, item))),
            _ => Value::Undefined,
        },
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Or => Value::Bool(left.truthy() || right.truthy()),
        BinaryOp::And => Value::Bool(left.truthy() && right.truthy()),
        BinaryOp::Equal | BinaryOp::NotEqual => {
            if left.is_undefined() || right.is_undefined() {
                return Value::Bool(false);
            }
            let equal = values_equal(left, right);
            Value::Bool(if op == BinaryOp::Equal { equal } else { !equal })
        }
        BinaryOp::Less | BinaryOp::LessOrEqual | BinaryOp::Greater | BinaryOp::GreaterOrEqual => {
            let Some(ordering) = compare(left, right) else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessOrEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
        BinaryOp::Add => match (left, right) {
            (Value::Undefined, _) | (_, Value::Undefined) => Value::Undefined,
            (Value::Text(_), _) | (_, Value::Text(_)) => Value::text(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )),
            _ => arithmetic(left, right, |a, b| a + b),
        },
        BinaryOp::Subtract => arithmetic(left, right, |a, b| a - b),
        BinaryOp::Multiply => arithmetic(left, right, |a, b| a * b),
        BinaryOp::Divide => arithmetic(left, right, |a, b| a / b),
        BinaryOp::Power => arithmetic(left, right, f64::powf),
    }
}

/// Numeric operation, elementwise over equal-length tuples.
fn arithmetic(left: &Value, right: &Value, op: fn(f64, f64) -> f64) -> Value {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let result = op(*a, *b);
            if result.is_finite() {
                Value::Number(result)
            } else {
                Value::Undefined
            }
        }
        (Value::Tuple(a), Value::Tuple(b)) if a.len() == b.len() => Value::tuple(
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| arithmetic(x, y, op)),
        ),
        (Value::Tuple(items), Value::Number(_)) => {
            Value::tuple(items.iter().map(|item| arithmetic(item, right, op)))
        }
        (Value::Number(_), Value::Tuple(items)) => {
            Value::tuple(items.iter().map(|item| arithmetic(left, item, op)))
        }
        _ => Value::Undefined,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Number(_), Value::Text(_)) => values_equal(left, &right.to_number()),
        (Value::Text(_), Value::Number(_)) => values_equal(&left.to_number(), right),
        (Value::Bool(_), Value::Text(_)) => values_equal(left, &right.to_bool()),
        (Value::Text(_), Value::Bool(_)) => values_equal(&left.to_bool(), right),
        (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Number(_), Value::Text(_)) => compare(left, &right.to_number()),
        (Value::Text(_), Value::Number(_)) => compare(&left.to_number(), right),
        _ => None,
    }
}

fn numbers(values: &[Value]) -> Option<Vec<f64>> {
    // A single list argument spreads: max($seq.values)
    let items = match values {
        [single] => single.items().unwrap_or(values),
        _ => values,
    };
    items.iter().map(Value::as_number).collect()
}

fn call(function: &str, args: &[Value]) -> EvalResult<Value> {
    let single = |op: fn(f64) -> f64| -> EvalResult<Value> {
        match args {
            [Value::Number(number)] => Ok(Value::Number(op(*number))),
            [_] => Ok(Value::Undefined),
            _ => Err(EvalIssue::Failed(format!(
                "{function}() takes one argument, got {}",
                args.len()
            ))),
        }
    };
    match function {
        "abs" => single(f64::abs),
        "sqrt" => single(f64::sqrt),
        "round" => single(f64::round),
        "floor" => single(f64::floor),
        "ceil" => single(f64::ceil),
        "min" => Ok(numbers(args)
            .and_then(|values| values.into_iter().reduce(f64::min))
            .map(Value::Number)
            .unwrap_or(Value::Undefined)),
        "max" => Ok(numbers(args)
            .and_then(|values| values.into_iter().reduce(f64::max))
            .map(Value::Number)
            .unwrap_or(Value::Undefined)),
        "sum" => Ok(numbers(args)
            .map(|values| Value::Number(values.into_iter().sum()))
            .unwrap_or(Value::Undefined)),
        "count" => {
            let count = match args {
                [single] => single.items().map_or(1, <[Value]>::len),
                _ => args.len(),
            };
            Ok(Value::Number(count as f64))
        }
        "row" | "column" => match args {
            [matrix, Value::Number(index)] if function == "row" => Ok(matrix.index(*index)),
            [matrix, Value::Number(index)] => Ok(matrix.column(*index)),
            [_, _] => Ok(Value::Undefined),
            _ => Err(EvalIssue::Failed(format!(
                "{function}() takes a matrix and an index, got {} arguments",
                args.len()
            ))),
        },
        _ => Err(EvalIssue::Failed(format!("unknown function `{function}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_propagates_through_arithmetic() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::Undefined, &Value::Number(1.0)),
            Value::Undefined
        );
        assert_eq!(
            binary(BinaryOp::Divide, &Value::Number(1.0), &Value::Number(0.0)),
            Value::Undefined
        );
        assert_eq!(
            binary(BinaryOp::Equal, &Value::Undefined, &Value::Undefined),
            Value::Bool(false)
        );
    }

    #[test]
    fn text_concatenation_and_comparison() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::text("x = "), &Value::Number(2.0)),
            Value::text("x = 2")
        );
        assert_eq!(
            binary(BinaryOp::Equal, &Value::text("3"), &Value::Number(3.0)),
            Value::Bool(true)
        );
        assert_eq!(
            binary(BinaryOp::Less, &Value::Number(2.0), &Value::Number(3.0)),
            Value::Bool(true)
        );
    }

    #[test]
    fn tuple_arithmetic() {
        let a = Value::tuple([Value::Number(1.0), Value::Number(2.0)]);
        let b = Value::tuple([Value::Number(3.0), Value::Number(5.0)]);
        assert_eq!(
            binary(BinaryOp::Add, &a, &b),
            Value::tuple([Value::Number(4.0), Value::Number(7.0)])
        );
    }

    #[test]
    fn builtin_functions() {
        let list = Value::list([Value::Number(4.0), Value::Number(-1.0), Value::Number(2.0)]);
        assert_eq!(call("max", &[list.clone()]), Ok(Value::Number(4.0)));
        assert_eq!(call("sum", &[list.clone()]), Ok(Value::Number(5.0)));
        assert_eq!(call("count", &[list]), Ok(Value::Number(3.0)));
        assert_eq!(call("abs", &[Value::Number(-2.0)]), Ok(Value::Number(2.0)));
        assert!(matches!(call("nope", &[]), Err(EvalIssue::Failed(_))));
    }

    #[test]
    fn matrix_projections() {
        let row = |a: f64, b: f64| Value::list([Value::Number(a), Value::Number(b)]);
        let matrix = Value::list([row(1.0, 2.0), row(3.0, 4.0)]);
        assert_eq!(
            call("row", &[matrix.clone(), Value::Number(2.0)]),
            Ok(row(3.0, 4.0))
        );
        assert_eq!(
            call("column", &[matrix.clone(), Value::Number(1.0)]),
            Ok(Value::list([Value::Number(1.0), Value::Number(3.0)]))
        );
        assert_eq!(
            call("column", &[matrix.clone(), Value::Undefined]),
            Ok(Value::Undefined)
        );
        assert!(matches!(call("column", &[matrix]), Err(EvalIssue::Failed(_))));
    }
}
