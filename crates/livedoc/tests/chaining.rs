//! Action chaining: cascades, condition gates and interaction gates.

mod common;

use common::TestEngine;
use livedoc::engine::RequestSource;
use livedoc::{ActionRequest, Disposition, EngineConfig, EngineError, Interaction, Issue, Phase, Rejection};
use serde_json::json;

#[test]
fn cascade_fires_downstream_in_order() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 0}},
        {"type": "updateValue", "name": "a", "attributes": {"triggerWith": "b", "target": "n", "newValue": "$n - 3"}},
        {"type": "updateValue", "name": "b", "attributes": {"triggerWith": "c", "target": "n", "newValue": "$n * 10"}},
        {"type": "updateValue", "name": "c", "attributes": {"target": "n", "newValue": "$n + 1"}}
    ]));

    let report = doc.act("c", "updateValue");
    assert_eq!(
        report.fired_names(),
        vec!["/c:updateValue", "/b:updateValue", "/a:updateValue"]
    );
    assert_eq!(report.fired[0].source, RequestSource::External);
    assert_eq!(report.fired[1].source, RequestSource::Internal);
    doc.assert_eq("n", "value", 7.0);
    assert_eq!(doc.engine.phase(), Phase::Settled);
}

#[test]
fn cascade_list_may_name_several_upstreams() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "hits", "attributes": {"prefill": 0}},
        {"type": "booleanInput", "name": "x"},
        {"type": "booleanInput", "name": "y"},
        {"type": "updateValue", "name": "count", "attributes": {"triggerWith": "x y", "target": "hits", "newValue": "$hits + 1"}}
    ]));

    doc.act("x", "toggle");
    doc.act("y", "toggle");
    doc.act("x", "toggle");
    doc.assert_eq("hits", "value", 3.0);
}

#[test]
fn condition_gate_fires_on_rising_edge_only() {
    let mut doc = TestEngine::new(json!([
        {"type": "booleanInput", "name": "g1", "attributes": {"prefill": true}},
        {"type": "booleanInput", "name": "g2", "attributes": {"prefill": true}},
        {"type": "numberInput", "name": "hits", "attributes": {"prefill": 0}},
        {"type": "updateValue", "name": "count", "attributes": {
            "triggerWhen": "$g1 and not $g2", "target": "hits", "newValue": "$hits + 1"
        }}
    ]));
    doc.assert_eq("hits", "value", 0.0);

    let report = doc.act("g2", "toggle");
    assert_eq!(report.fired_names(), vec!["/g2:toggle", "/count:updateValue"]);
    doc.assert_eq("hits", "value", 1.0);

    doc.act("g2", "toggle");
    doc.assert_eq("hits", "value", 1.0);

    doc.act("g2", "toggle");
    doc.assert_eq("hits", "value", 2.0);

    // Condition already true: storing the same input again must not re-fire
    let report = doc.act_with("g1", "updateBoolean", "value", true);
    assert_eq!(report.fired_names(), vec!["/g1:updateBoolean"]);
    doc.assert_eq("hits", "value", 2.0);
}

#[test]
fn condition_true_at_start_is_only_a_baseline() {
    let mut doc = TestEngine::new(json!([
        {"type": "booleanInput", "name": "g", "attributes": {"prefill": true}},
        {"type": "numberInput", "name": "hits", "attributes": {"prefill": 0}},
        {"type": "updateValue", "name": "count", "attributes": {
            "triggerWhen": "$g", "target": "hits", "newValue": "$hits + 1"
        }}
    ]));
    doc.engine.settle().unwrap();
    doc.assert_eq("hits", "value", 0.0);

    doc.act("g", "toggle");
    doc.act("g", "toggle");
    doc.assert_eq("hits", "value", 1.0);
}

#[test]
fn condition_gate_supersedes_cascade() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 0}},
        {"type": "numberInput", "name": "hits", "attributes": {"prefill": 0}},
        {"type": "updateValue", "name": "inc", "attributes": {"target": "n", "newValue": "$n + 1"}},
        {"type": "updateValue", "name": "gated", "attributes": {
            "triggerWith": "inc", "triggerWhen": "$n > 2", "target": "hits", "newValue": "$hits + 1"
        }}
    ]));

    doc.act("inc", "updateValue");
    doc.act("inc", "updateValue");
    doc.assert_eq("hits", "value", 0.0);

    // The cascade's own write raises the condition: the gate fires once
    let report = doc.act("inc", "updateValue");
    assert_eq!(report.fired_names(), vec!["/inc:updateValue", "/gated:updateValue"]);
    doc.assert_eq("hits", "value", 1.0);

    let report = doc.act("inc", "updateValue");
    assert_eq!(report.fired_names(), vec!["/inc:updateValue"]);
    doc.assert_eq("n", "value", 4.0);
    doc.assert_eq("hits", "value", 1.0);
}

#[test]
fn interaction_gate_follows_clicks_on_named_components() {
    let mut doc = TestEngine::new(json!([
        {"type": "point", "name": "pt", "attributes": {"x": 1, "y": 2}},
        {"type": "point", "name": "other"},
        {"type": "numberInput", "name": "clicks", "attributes": {"prefill": 0}},
        {"type": "updateValue", "name": "count", "attributes": {
            "triggerWhenObjectsClicked": "pt", "target": "clicks", "newValue": "$clicks + 1"
        }}
    ]));

    let id = doc.engine.interact(Interaction::click("pt"));
    let reports = doc.engine.process_pending().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].disposition(id), Some(&Disposition::Accepted));
    doc.assert_eq("clicks", "value", 1.0);

    doc.engine.interact(Interaction::click("other"));
    doc.engine.interact(Interaction::focus("pt"));
    doc.engine.process_pending().unwrap();
    doc.assert_eq("clicks", "value", 1.0);
}

#[test]
fn disabled_target_changes_nothing() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 1}},
        {"type": "updateValue", "name": "u", "attributes": {"disabled": true, "target": "n", "newValue": "5"}},
        {"type": "updateValue", "name": "after", "attributes": {"triggerWith": "u", "target": "n", "newValue": "9"}}
    ]));
    let before = doc.engine.snapshot().unwrap();

    let id = doc.engine.request_action(ActionRequest::new("u", "updateValue"));
    let reports = doc.engine.process_pending().unwrap();
    let report = &reports[0];
    assert_eq!(
        report.disposition(id),
        Some(&Disposition::Rejected(Rejection::DisabledTarget))
    );
    assert!(report.fired.is_empty());
    assert!(report.issues.is_empty());
    assert_eq!(doc.engine.snapshot().unwrap(), before);
}

#[test]
fn disabled_children_are_skipped_by_trigger_sets() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "a", "attributes": {"prefill": 0}},
        {"type": "numberInput", "name": "b", "attributes": {"prefill": 0}},
        {"type": "triggerSet", "name": "both", "children": [
            {"type": "updateValue", "attributes": {"target": "a", "newValue": "1"}},
            {"type": "updateValue", "attributes": {"target": "b", "newValue": "1", "disabled": true}}
        ]}
    ]));
    doc.act("both", "triggerActions");
    doc.assert_eq("a", "value", 1.0);
    doc.assert_eq("b", "value", 0.0);
}

#[test]
fn read_only_rejects_external_requests() {
    let mut doc = TestEngine::with_config(
        json!([{"type": "numberInput", "name": "n", "attributes": {"prefill": 1}}]),
        EngineConfig::default().read_only(true),
    );
    let id = doc.engine.request_action(ActionRequest::new("n", "updateValue").with_arg("value", 4.0));
    let click = doc.engine.interact(Interaction::click("n"));
    let reports = doc.engine.process_pending().unwrap();

    assert_eq!(
        reports[0].disposition(id),
        Some(&Disposition::Rejected(Rejection::ReadOnlyRejected))
    );
    assert_eq!(
        reports[1].disposition(click),
        Some(&Disposition::Rejected(Rejection::ReadOnlyRejected))
    );
    doc.assert_eq("n", "value", 1.0);
}

#[test]
fn unknown_action_is_reported_and_discarded() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 1}}
    ]));
    let report = doc.act("n", "explode");
    assert!(report.fired.is_empty());
    assert_eq!(
        report.results[0].disposition,
        Disposition::Rejected(Rejection::UnknownAction("explode".to_string()))
    );
    assert!(report.issues.contains(&Issue::UnknownAction {
        target: "n".to_string(),
        action: "explode".to_string(),
    }));

    // Names match without regard to case
    doc.dispatch(ActionRequest::new("n", "UPDATEVALUE").with_arg("value", 2.0));
    doc.assert_eq("n", "value", 2.0);
}

#[test]
fn unresolved_target_is_rejected() {
    let mut doc = TestEngine::new(json!([{"type": "numberInput", "name": "n"}]));
    let report = doc.act("nobody", "updateValue");
    assert_eq!(
        report.results[0].disposition,
        Disposition::Rejected(Rejection::UnresolvedTarget("nobody".to_string()))
    );
}

#[test]
fn call_action_forwards_evaluated_arguments() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 1}},
        {"type": "callAction", "name": "bump", "attributes": {
            "target": "n", "actionName": "updateValue", "arg:value": "$n + 10"
        }}
    ]));
    let report = doc.act("bump", "callAction");
    assert_eq!(report.fired_names(), vec!["/bump:callAction", "/n:updateValue"]);
    doc.assert_eq("n", "value", 11.0);
}

#[test]
fn runaway_chain_aborts_the_cycle() {
    let mut doc = TestEngine::with_config(
        json!([
            {"type": "numberInput", "name": "n", "attributes": {"prefill": 0}},
            {"type": "updateValue", "name": "ping", "attributes": {"triggerWith": "pong", "target": "n", "newValue": "$n + 1"}},
            {"type": "updateValue", "name": "pong", "attributes": {"triggerWith": "ping", "target": "n", "newValue": "$n + 1"}}
        ]),
        EngineConfig::default().max_chained_actions(10),
    );

    let result = doc.engine.dispatch(ActionRequest::new("ping", "updateValue"));
    assert_eq!(result.unwrap_err(), EngineError::ChainLimitExceeded { limit: 10 });
    assert_eq!(doc.engine.phase(), Phase::Idle);
    assert!(matches!(
        doc.engine.snapshot(),
        Err(EngineError::NotSettled { phase: Phase::Idle })
    ));

    doc.engine.settle().unwrap();
    assert_eq!(doc.engine.phase(), Phase::Settled);
    assert!(doc.engine.snapshot().is_ok());
}

#[test]
fn queued_requests_run_one_cycle_each() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 0}}
    ]));
    let first = doc.engine.request_action(ActionRequest::new("n", "updateValue").with_arg("value", 1.0));
    let second = doc.engine.request_action(ActionRequest::new("n", "updateValue").with_arg("value", 2.0));
    assert_eq!(doc.engine.pending(), 2);

    let reports = doc.engine.process_pending().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].disposition(first).is_some_and(Disposition::is_accepted));
    assert!(reports[1].disposition(second).is_some_and(Disposition::is_accepted));
    assert_eq!(reports[1].cycle, reports[0].cycle + 1);
    doc.assert_eq("n", "value", 2.0);

    doc.engine.request_action(ActionRequest::new("n", "updateValue").with_arg("value", 3.0));
    assert_eq!(doc.engine.cancel_pending(), 1);
    assert!(doc.engine.process_pending().unwrap().is_empty());
    doc.assert_eq("n", "value", 2.0);
}
