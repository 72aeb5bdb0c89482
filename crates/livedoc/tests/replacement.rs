//! Composites: branches, iterations, mirrors and pages.

mod common;

use common::TestEngine;
use livedoc::{Issue, Value};
use serde_json::json;

fn counted_map() -> serde_json::Value {
    json!([
        {"type": "numberInput", "name": "len", "attributes": {"prefill": 2}},
        {"type": "sequence", "name": "s", "attributes": {"length": "$len"}},
        {"type": "map", "name": "m", "attributes": {"sources": "$s.values", "assignNames": "a b c"}, "children": [
            {"type": "numberInput", "name": "counter", "attributes": {"prefill": 0}},
            {"type": "math", "name": "twice", "attributes": {"value": "$v * 2"}}
        ]}
    ])
}

#[test]
fn growing_iteration_keeps_earlier_state() {
    let mut doc = TestEngine::new(counted_map());
    doc.assert_eq("/a/v", "value", 1.0);
    doc.assert_eq("/b/twice", "value", 4.0);
    assert!(!doc.exists("/c/counter"));

    doc.set_number("/a/counter", 5.0);
    doc.set_number("/b/counter", 7.0);
    doc.set_number("len", 3.0);
    doc.assert_eq("/a/counter", "value", 5.0);
    doc.assert_eq("/b/counter", "value", 7.0);
    doc.assert_eq("/c/counter", "value", 0.0);
    doc.assert_eq("/c/twice", "value", 6.0);
}

#[test]
fn regrown_iteration_starts_fresh() {
    let mut doc = TestEngine::new(counted_map());
    doc.set_number("len", 3.0);
    doc.set_number("/c/counter", 9.0);

    doc.set_number("len", 2.0);
    assert!(!doc.exists("/c/counter"));
    assert_eq!(doc.active("m").len(), 2);

    doc.set_number("len", 3.0);
    doc.assert_eq("/c/counter", "value", 0.0);
}

#[test]
fn iteration_aliases_follow_changing_sources() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "start", "attributes": {"prefill": 10}},
        {"type": "sequence", "name": "s", "attributes": {"from": "$start", "length": 2}},
        {"type": "map", "name": "m", "attributes": {"sources": "$s.values", "assignNames": "a b"}, "children": [
            {"type": "numberInput", "name": "counter", "attributes": {"prefill": 0}},
            {"type": "p", "name": "out", "children": ["$i: $v"]}
        ]}
    ]));
    doc.set_number("/b/counter", 3.0);
    assert_eq!(doc.engine.text("/b/out").as_deref(), Some("2: 11"));

    doc.set_number("start", 20.0);
    assert_eq!(doc.engine.text("/b/out").as_deref(), Some("2: 21"));
    doc.assert_eq("/b/counter", "value", 3.0);
}

fn branching(extra: serde_json::Value) -> serde_json::Value {
    let mut children = vec![
        json!({"type": "booleanInput", "name": "flag", "attributes": {"prefill": true}}),
        json!({"type": "conditionalContent", "name": "cc", "children": [
            {"type": "case", "attributes": {"condition": "$flag"}, "children": [
                {"type": "numberInput", "name": "inner", "attributes": {"prefill": 1}}
            ]},
            {"type": "else", "children": [
                {"type": "textInput", "name": "other", "attributes": {"prefill": "hello"}}
            ]}
        ]}),
    ];
    if let serde_json::Value::Array(extra) = extra {
        children.extend(extra);
    }
    serde_json::Value::Array(children)
}

#[test]
fn switching_branches_discards_branch_state() {
    let mut doc = TestEngine::new(branching(json!([])));
    doc.set_number("inner", 42.0);

    doc.act("flag", "toggle");
    assert!(!doc.exists("inner"));
    doc.assert_eq("other", "value", "hello");

    doc.act("flag", "toggle");
    assert!(!doc.exists("other"));
    doc.assert_eq("inner", "value", 1.0);
}

#[test]
fn condition_shorthand_renders_nothing_when_false() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 1}},
        {"type": "p", "name": "out", "children": [
            "n is ",
            {"type": "conditionalContent", "attributes": {"condition": "$n > 2"}, "children": ["big"]}
        ]}
    ]));
    assert_eq!(doc.engine.text("out").as_deref(), Some("n is "));
    doc.set_number("n", 3.0);
    assert_eq!(doc.engine.text("out").as_deref(), Some("n is big"));
}

#[test]
fn mirror_of_a_mirror_follows_branch_switches() {
    let mut doc = TestEngine::new(branching(json!([
        {"type": "copy", "name": "c1", "attributes": {"target": "cc", "assignNames": "m1"}},
        {"type": "copy", "name": "c2", "attributes": {"target": "c1", "assignNames": "m2"}}
    ])));
    doc.assert_eq("m2", "value", 1.0);

    doc.set_number("inner", 5.0);
    doc.assert_eq("m1", "value", 5.0);
    doc.assert_eq("m2", "value", 5.0);

    let report = doc.act("flag", "toggle");
    assert_eq!(report.fired_names(), vec!["/flag:toggle"]);
    doc.assert_eq("m1", "value", "hello");
    doc.assert_eq("m2", "value", "hello");
}

#[test]
fn edits_through_a_copy_reach_the_original() {
    let mut doc = TestEngine::new(json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 1}},
        {"type": "copy", "attributes": {"source": "$n", "assignNames": "m"}},
        {"type": "p", "name": "out", "children": ["n = $n"]}
    ]));
    doc.set_number("m", 5.0);
    doc.assert_eq("n", "value", 5.0);
    doc.assert_eq("m", "value", 5.0);
    assert_eq!(doc.engine.text("out").as_deref(), Some("n = 5"));
}

#[test]
fn projected_copies_write_through_to_the_state() {
    let mut doc = TestEngine::new(json!([
        {"type": "point", "name": "p", "attributes": {"x": 1, "y": 2}},
        {"type": "copy", "attributes": {"source": "$p.x", "assignNames": "px"}},
        {"type": "copy", "attributes": {"source": "$p.coords[2]", "assignNames": "py"}}
    ]));
    doc.assert_eq("px", "value", 1.0);
    doc.assert_eq("py", "value", 2.0);

    doc.dispatch(livedoc::ActionRequest::new("p", "movePoint").with_arg("y", 8.0));
    doc.assert_eq("px", "value", 1.0);
    doc.assert_eq("py", "value", 8.0);
}

#[test]
fn collect_gathers_matching_descendants() {
    let mut doc = TestEngine::new(json!([
        {"type": "group", "name": "g", "children": [
            {"type": "numberInput", "name": "x", "attributes": {"prefill": 1}},
            {"type": "textInput", "name": "label"},
            {"type": "numberInput", "name": "y", "attributes": {"prefill": 2}}
        ]},
        {"type": "collect", "name": "all", "attributes": {
            "target": "g", "componentTypes": "numberInput", "prop": "value", "assignNames": "c1 c2"
        }},
        {"type": "collect", "name": "first", "attributes": {
            "target": "g", "componentTypes": "numberInput", "maxNumber": 1
        }}
    ]));
    doc.assert_eq("c1", "value", 1.0);
    doc.assert_eq("c2", "value", 2.0);
    assert_eq!(doc.active("first").len(), 1);

    doc.set_number("y", 6.0);
    doc.assert_eq("c2", "value", 6.0);
}

#[test]
fn paginator_keeps_pages_it_is_not_showing() {
    let mut doc = TestEngine::new(json!([
        {"type": "paginator", "name": "pg", "children": [
            {"type": "group", "name": "page1", "children": [{"type": "numberInput", "name": "a"}]},
            {"type": "group", "name": "page2", "children": [{"type": "numberInput", "name": "b"}]}
        ]},
        {"type": "callAction", "name": "next", "attributes": {"target": "pg", "actionName": "nextPage"}}
    ]));
    assert_eq!(doc.active("pg"), vec!["/page1"]);
    doc.assert_eq("pg", "numPages", 2.0);
    doc.set_number("a", 3.0);

    doc.act("next", "callAction");
    assert_eq!(doc.active("pg"), vec!["/page2"]);
    doc.assert_eq("a", "value", 3.0);

    doc.act("pg", "nextPage");
    doc.assert_eq("pg", "currentPage", 2.0);

    doc.act_with("pg", "setPage", "number", 1.0);
    assert_eq!(doc.active("pg"), vec!["/page1"]);
    doc.assert_eq("a", "value", 3.0);

    let snapshot = doc.engine.snapshot().unwrap();
    let pages = snapshot.component("/pg").unwrap().replacements.clone().unwrap();
    assert_eq!(pages.len(), 2);
    assert!(!pages[0].withheld);
    assert!(pages[1].withheld);
}

#[test]
fn failed_replacement_keeps_previous_content() {
    let mut doc = TestEngine::new(json!([
        {"type": "booleanInput", "name": "flag", "attributes": {"prefill": true}},
        {"type": "numberInput", "name": "taken"},
        {"type": "conditionalContent", "name": "cc", "children": [
            {"type": "case", "attributes": {"condition": "$flag"}, "children": [
                {"type": "text", "name": "ok", "attributes": {"value": "fine"}}
            ]},
            {"type": "else", "children": [{"type": "text", "name": "taken"}]}
        ]}
    ]));
    assert!(doc.exists("ok"));

    let report = doc.act("flag", "toggle");
    assert!(report.results[0].disposition.is_accepted());
    assert!(report.issues.iter().any(|issue| matches!(
        issue,
        Issue::PartialReplacementFailure { composite, .. } if composite.as_str() == "/cc"
    )));
    doc.assert_eq("ok", "value", "fine");
    doc.assert_eq("flag", "value", false);

    // Back on the applied branch: nothing to rebuild
    doc.act("flag", "toggle");
    doc.assert_eq("ok", "value", "fine");
}

#[test]
fn copy_without_source_reports_failure() {
    let mut doc = TestEngine::new(json!([
        {"type": "copy", "name": "broken"},
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 1}}
    ]));
    let report = doc.engine.settle().unwrap();
    assert!(report.issues.iter().any(|issue| matches!(
        issue,
        Issue::PartialReplacementFailure { composite, .. } if composite.as_str() == "/broken"
    )));
    assert!(doc.active("broken").is_empty());
    assert_eq!(doc.value("n", "value"), Value::Number(1.0));
}

#[test]
fn feedback_respects_document_flag() {
    let children = json!([
        {"type": "numberInput", "name": "n", "attributes": {"prefill": 3}},
        {"type": "p", "name": "out", "children": [
            {"type": "feedback", "attributes": {"condition": "$n = 3"}, "children": ["right"]}
        ]}
    ]);
    let mut shown = TestEngine::new(children.clone());
    assert_eq!(shown.engine.text("out").as_deref(), Some("right"));

    let mut hidden = TestEngine::with_config(
        children,
        livedoc::EngineConfig::default().show_feedback(false),
    );
    assert_eq!(hidden.engine.text("out").as_deref(), Some(""));
}
