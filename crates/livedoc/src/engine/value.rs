use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::address::ComponentId;
use super::replacement::ReplacementPlan;

/// Text shown where a value is not known yet.
pub const UNDEFINED_TEXT: &str = "\u{FF3F}";

/// Value of a state variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Not computable yet: pending reference, missing input, bad arithmetic.
    #[default]
    Undefined,
    Number(f64),
    Text(Arc<str>),
    Bool(bool),
    /// Fixed-arity value such as point coordinates.
    Tuple(Arc<[Value]>),
    List(Arc<[Value]>),
    Component(ComponentId),
    /// Replacement plan computed by a composite.
    Subtree(Arc<ReplacementPlan>),
}

impl Value {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentId> {
        match self {
            Self::Component(id) => Some(id),
            _ => None,
        }
    }

    /// Items of a tuple or list.
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(items) | Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Truth used by conditions. Undefined is false.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::Text(text) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// 1-based indexing into tuples and lists; anything out of range is Undefined.
    pub fn index(&self, index: f64) -> Value {
        let Some(items) = self.items() else {
            return Value::Undefined;
        };
        if index.fract() != 0.0 || index < 1.0 {
            return Value::Undefined;
        }
        items
            .get(index as usize - 1)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Entry `index` of every row of a matrix, as a list. Undefined unless
    /// every row has that entry.
    pub fn column(&self, index: f64) -> Value {
        let Some(rows) = self.items() else {
            return Value::Undefined;
        };
        let mut column = Vec::with_capacity(rows.len());
        for row in rows {
            match row.index(index) {
                Value::Undefined => return Value::Undefined,
                entry => column.push(entry),
            }
        }
        Value::list(column)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Bool(_) => "boolean",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Component(_) => "component",
            Self::Subtree(_) => "subtree",
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => UNDEFINED_TEXT.to_string(),
            Self::Number(number) => format_number(*number),
            Self::Text(text) => text.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_display_string).collect();
                format!("({})", inner.join(", "))
            }
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_display_string).collect();
                inner.join(", ")
            }
            Self::Component(id) => id.to_string(),
            Self::Subtree(_) => String::new(),
        }
    }

    /// Converts action arguments and script values.
    ///
    /// `{"component": "/p"}` and `{"tuple": [..]}` select the non-JSON kinds.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Undefined,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(number) => number
                .as_f64()
                .map(Value::Number)
                .unwrap_or(Value::Undefined),
            serde_json::Value::String(text) => Value::text(text.as_str()),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json)),
            serde_json::Value::Object(fields) => {
                if let Some(serde_json::Value::String(id)) = fields.get("component") {
                    Value::Component(ComponentId::new(id.as_str()))
                } else if let Some(serde_json::Value::Array(items)) = fields.get("tuple") {
                    Value::tuple(items.iter().map(Value::from_json))
                } else {
                    Value::Undefined
                }
            }
        }
    }

    /// Coerces to a number; text is parsed, booleans are not numbers.
    pub fn to_number(&self) -> Value {
        match self {
            Self::Number(_) => self.clone(),
            Self::Text(text) => text
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    /// Coerces to a boolean; `"true"`/`"false"` text is accepted.
    pub fn to_bool(&self) -> Value {
        match self {
            Self::Bool(_) => self.clone(),
            Self::Number(number) => Value::Bool(*number != 0.0),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined => serializer.serialize_none(),
            Self::Number(number) => serializer.serialize_f64(*number),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Tuple(items) | Self::List(items) => serializer.collect_seq(items.iter()),
            Self::Component(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("component", id.as_str())?;
                map.end()
            }
            Self::Subtree(plan) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("entries", &plan.entries.len())?;
                map.end()
            }
        }
    }
}

/// Formats numbers the way documents show them: integers without a
/// fraction, at most ten decimals, and no negative zero.
pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        return "NaN".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let rounded = if number.abs() < 1e15 {
        (number * 1e10).round() / 1e10
    } else {
        number
    };
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{rounded}")
}
