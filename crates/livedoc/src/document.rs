//! Pre-parsed component tree consumed by the engine.
//!
//! Documents arrive as JSON:
//!
//! ```json
//! {"type": "document", "children": [
//!     {"type": "numberInput", "name": "n", "attributes": {"prefill": 3}},
//!     {"type": "p", "children": ["Twice n is $twice."]}
//! ]}
//! ```
//!
//! Text children may contain `$reference` macros; they are expanded into
//! `copy` components when the tree is instantiated.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::address::{ComponentId, StateKey};
use crate::engine::value::format_number;
use crate::expr::parser::{TemplatePart, parse_template};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_attributes",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildSpec>,
    /// Set on linked copies made by mirrors.
    #[serde(skip)]
    pub link: Option<Link>,
}

/// Source a linked copy shares its state with.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    /// Every class state of the copy links to the same state of the source.
    Component(ComponentId),
    /// The copy's primary state links to one state of the source.
    State(StateKey),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildSpec {
    Text(String),
    Component(ComponentSpec),
}

impl ComponentSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            attributes: BTreeMap::new(),
            children: Vec::new(),
            link: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, child: ComponentSpec) -> Self {
        self.children.push(ChildSpec::Component(child));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(ChildSpec::Text(text.into()));
        self
    }

    pub fn linked(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// List-valued attribute. Commas separate items and keep blanks
    /// (`"a,,c"`); without commas items are whitespace separated.
    pub fn list_attribute(&self, key: &str) -> Vec<String> {
        self.attribute(key).map(split_list).unwrap_or_default()
    }

    pub fn component_children(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.children.iter().filter_map(|child| match child {
            ChildSpec::Component(spec) => Some(spec),
            ChildSpec::Text(_) => None,
        })
    }
}

pub(crate) fn split_list(text: &str) -> Vec<String> {
    if text.contains(',') {
        text.split(',').map(|item| item.trim().to_string()).collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// Turns text children into `string` runs and `copy` macros.
pub fn expand_children(children: &[ChildSpec]) -> Vec<ComponentSpec> {
    let mut expanded = Vec::with_capacity(children.len());
    for child in children {
        match child {
            ChildSpec::Component(spec) => expanded.push(spec.clone()),
            ChildSpec::Text(text) => expand_text(text, &mut expanded),
        }
    }
    expanded
}

fn expand_text(text: &str, out: &mut Vec<ComponentSpec>) {
    let parts = match parse_template(text) {
        Ok(parts) => parts,
        Err(failure) => {
            log::warn!("keeping text as written: {failure}");
            vec![TemplatePart::Literal(text.to_string())]
        }
    };
    for part in parts {
        match part {
            TemplatePart::Literal(literal) => {
                out.push(ComponentSpec::new("string").attr("value", literal))
            }
            TemplatePart::Macro(source) => out.push(ComponentSpec::new("copy").attr("source", source)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttribute {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

fn deserialize_attributes<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, RawAttribute>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                RawAttribute::Text(text) => text,
                RawAttribute::Number(number) => format_number(number),
                RawAttribute::Bool(flag) => flag.to_string(),
                RawAttribute::List(items) => items.join(","),
            };
            (key, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_normalize_to_text() {
        let spec = ComponentSpec::from_json(
            r#"{"type": "map", "attributes": {"prefill": 3, "hide": true, "assignNames": ["a", "", "c"]}}"#,
        )
        .unwrap();
        assert_eq!(spec.attribute("prefill"), Some("3"));
        assert_eq!(spec.attribute("hide"), Some("true"));
        assert_eq!(spec.list_attribute("assignNames"), vec!["a", "", "c"]);
    }

    #[test]
    fn whitespace_lists() {
        let spec = ComponentSpec::new("collect").attr("componentTypes", "point  text");
        assert_eq!(spec.list_attribute("componentTypes"), vec!["point", "text"]);
    }

    #[test]
    fn text_children_become_strings_and_copies() {
        let children = vec![ChildSpec::Text("Value: $n.value, cost $5".to_string())];
        let expanded = expand_children(&children);
        let kinds: Vec<&str> = expanded.iter().map(|spec| spec.kind.as_str()).collect();
        assert_eq!(kinds, vec!["string", "copy", "string"]);
        assert_eq!(expanded[0].attribute("value"), Some("Value: "));
        assert_eq!(expanded[1].attribute("source"), Some("$n.value"));
        assert_eq!(expanded[2].attribute("value"), Some(", cost $5"));
    }

    #[test]
    fn nested_children_parse() {
        let spec = ComponentSpec::from_json(
            r#"{"type": "p", "name": "p1", "children": ["Hi ", {"type": "text", "children": ["there"]}]}"#,
        )
        .unwrap();
        assert_eq!(spec.name.as_deref(), Some("p1"));
        assert_eq!(spec.component_children().count(), 1);
        assert_eq!(spec.children.len(), 2);
    }
}
