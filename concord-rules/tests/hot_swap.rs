//! Hot-swapping declarative rule sets between dispatches

use concord_engine::{Concept, Runner};
use concord_rules::load_rules;
use concord_types::{RuleRecord, RuleSet, ThenClause, WhenClause};
use serde_json::{json, Value};

fn rule_set(name: &str, action: &str) -> RuleSet {
    RuleSet {
        synchronizations: vec![RuleRecord {
            name: name.to_string(),
            when: WhenClause {
                source: "SourceConcept".to_string(),
                event: "trigger".to_string(),
            },
            where_: None,
            then: vec![ThenClause {
                target: "TargetConcept".to_string(),
                action: action.to_string(),
                payload: serde_json::Map::new(),
            }],
        }],
    }
}

#[test]
fn test_hot_swap() {
    let mut runner = Runner::new();
    let source = runner
        .register_concept(Concept::new("SourceConcept").on("trigger", |ctx, payload| {
            ctx.emit("trigger", payload);
        }))
        .unwrap();
    let target = runner
        .register_concept(
            Concept::new("TargetConcept")
                .with_state("last_action", Value::Null)
                .on("action_a", |ctx, _| ctx.set("last_action", json!("A")))
                .on("action_b", |ctx, _| ctx.set("last_action", json!("B"))),
        )
        .unwrap();

    load_rules(&mut runner, &rule_set("V1", "action_a")).unwrap();
    runner.start();

    runner.dispatch(source, "trigger", json!({})).unwrap();
    assert_eq!(
        runner.concept(target).unwrap().peek_state("last_action"),
        Some(&json!("A"))
    );

    runner.clear_synchronizations();
    load_rules(&mut runner, &rule_set("V2", "action_b")).unwrap();

    runner.dispatch(source, "trigger", json!({})).unwrap();
    assert_eq!(
        runner.concept(target).unwrap().peek_state("last_action"),
        Some(&json!("B"))
    );
    // no residual V1 rules
    assert_eq!(runner.stats().synchronizations, 1);
}

#[test]
fn test_records_deserialize_from_json_model() {
    // the loader consumes the deserialized model; the concrete file
    // format is the caller's business
    let text = r#"{
        "synchronizations": [
            {
                "name": "TestSync",
                "when": {"source": "SourceConcept", "event": "trigger"},
                "then": [
                    {
                        "target": "TargetConcept",
                        "action": "action_a",
                        "payload": {"val": "event.val", "const": 123}
                    }
                ]
            }
        ]
    }"#;
    let rules: RuleSet = serde_json::from_str(text).unwrap();

    let mut runner = Runner::new();
    let source = runner
        .register_concept(Concept::new("SourceConcept").on("trigger", |ctx, payload| {
            ctx.emit("trigger", payload);
        }))
        .unwrap();
    let target = runner
        .register_concept(
            Concept::new("TargetConcept")
                .with_state("last_payload", Value::Null)
                .on("action_a", |ctx, payload| ctx.set("last_payload", payload)),
        )
        .unwrap();

    load_rules(&mut runner, &rules).unwrap();
    runner.dispatch(source, "trigger", json!({"val": "hello"})).unwrap();

    assert_eq!(
        runner.concept(target).unwrap().peek_state("last_payload"),
        Some(&json!({"val": "hello", "const": 123}))
    );
}
