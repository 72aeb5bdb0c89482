//! Shared harness for the integration tests.

#![allow(dead_code)]

use livedoc::{ActionRequest, ComponentSpec, CycleReport, Engine, EngineConfig, Value};
use serde_json::Value as Json;

/// Unnamed `document` holding `children`.
pub fn document(children: Json) -> ComponentSpec {
    serde_json::from_value(serde_json::json!({ "type": "document", "children": children }))
        .expect("valid document")
}

pub struct TestEngine {
    pub engine: Engine,
}

impl TestEngine {
    pub fn new(children: Json) -> Self {
        Self::with_config(children, EngineConfig::default())
    }

    pub fn with_config(children: Json, config: EngineConfig) -> Self {
        let engine = Engine::new(document(children), config).expect("document settles");
        Self { engine }
    }

    pub fn dispatch(&mut self, request: ActionRequest) -> CycleReport {
        self.engine.dispatch(request).expect("cycle settles")
    }

    pub fn act(&mut self, target: &str, action: &str) -> CycleReport {
        self.dispatch(ActionRequest::new(target, action))
    }

    pub fn act_with(
        &mut self,
        target: &str,
        action: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> CycleReport {
        self.dispatch(ActionRequest::new(target, action).with_arg(name, value))
    }

    pub fn set_number(&mut self, target: &str, value: f64) -> CycleReport {
        self.act_with(target, "updateValue", "value", value)
    }

    pub fn value(&mut self, path: &str, state: &str) -> Value {
        self.engine
            .value(path, state)
            .unwrap_or_else(|| panic!("{path} has no state `{state}`"))
    }

    #[track_caller]
    pub fn assert_eq(&mut self, path: &str, state: &str, expected: impl Into<Value>) {
        let actual = self.value(path, state);
        assert_eq!(actual, expected.into(), "{path}.{state}");
    }

    pub fn exists(&self, path: &str) -> bool {
        self.engine.resolve(path).is_some()
    }

    pub fn active(&mut self, path: &str) -> Vec<String> {
        self.engine
            .active_children(path)
            .iter()
            .map(|id| id.to_string())
            .collect()
    }
}

pub fn point(x: f64, y: f64) -> Value {
    Value::tuple([Value::Number(x), Value::Number(y)])
}
