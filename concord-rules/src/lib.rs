//! Rule loader for the concord engine
//!
//! Compiles declarative [`RuleRecord`]s — the model a rule file
//! deserializes into — against a [`Runner`]: concept names resolve to
//! ids, payload mappings become mapper closures, guards become snapshot
//! predicates, and the resulting [`Synchronization`]s are registered in
//! record order.
//!
//! Loading is all-or-nothing per call: every record is resolved before
//! any synchronization is registered, so a bad record never leaves the
//! runner with half a rule set. Combined with
//! [`Runner::clear_synchronizations`], this gives hot-swap of rule sets
//! between dispatches:
//!
//! ```
//! use concord_engine::{Concept, Runner};
//! use concord_types::RuleSet;
//! use concord_rules::load_rules;
//!
//! # fn rule_set_v2() -> RuleSet { RuleSet::default() }
//! # let mut runner = Runner::new();
//! # runner.register_concept(Concept::new("C1")).unwrap();
//! runner.clear_synchronizations();
//! load_rules(&mut runner, &rule_set_v2()).unwrap();
//! ```

use concord_engine::{ActionInvocation, Runner, Synchronization};
use concord_types::records::map_payload_value;
use concord_types::{ConceptId, EventPattern, GlobalSnapshot, GuardClause, RuleRecord, RuleSet};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while compiling rule records
#[derive(Debug, Error)]
pub enum RuleError {
    /// A record names a concept the runner does not know
    #[error("rule `{rule}` references unknown concept `{concept}`")]
    UnknownConcept {
        /// The offending rule's name
        rule: String,
        /// The unresolved concept name
        concept: String,
    },
}

/// Result type using RuleError
pub type Result<T> = std::result::Result<T, RuleError>;

/// Compile a rule set and register its synchronizations
///
/// Records are registered in order; returns how many were registered.
/// On error nothing is registered.
pub fn load_rules(runner: &mut Runner, rules: &RuleSet) -> Result<usize> {
    let compiled = rules
        .synchronizations
        .iter()
        .map(|record| compile_rule(runner, record))
        .collect::<Result<Vec<_>>>()?;

    let count = compiled.len();
    for sync in compiled {
        runner.register_synchronization(sync);
    }
    tracing::debug!(count, "loaded rule set");
    Ok(count)
}

fn resolve(runner: &Runner, rule: &str, concept: &str) -> Result<ConceptId> {
    runner
        .concept_by_name(concept)
        .ok_or_else(|| RuleError::UnknownConcept {
            rule: rule.to_string(),
            concept: concept.to_string(),
        })
}

fn compile_rule(runner: &Runner, record: &RuleRecord) -> Result<Synchronization> {
    let source = resolve(runner, &record.name, &record.when.source)?;
    let mut sync = Synchronization::new(
        record.name.clone(),
        EventPattern::new(source, record.when.event.clone()),
    );

    if let Some(guard) = &record.where_ {
        sync = sync.with_guard(compile_guard(runner, &record.name, guard)?);
    }

    for clause in &record.then {
        let target = resolve(runner, &record.name, &clause.target)?;
        let mapping = clause.payload.clone();
        sync = sync.then(ActionInvocation::new(
            target,
            clause.action.clone(),
            move |event| {
                let mapped: serde_json::Map<String, Value> = mapping
                    .iter()
                    .map(|(key, value)| (key.clone(), map_payload_value(value, &event.payload)))
                    .collect();
                Value::Object(mapped)
            },
        ));
    }

    Ok(sync)
}

fn compile_guard(
    runner: &Runner,
    rule: &str,
    guard: &GuardClause,
) -> Result<impl Fn(&GlobalSnapshot) -> bool + 'static> {
    let concept = resolve(runner, rule, &guard.concept)?;
    let key = guard.key.clone();
    let expected = guard.equals.clone();
    Ok(move |snapshot: &GlobalSnapshot| {
        snapshot
            .get(&concept)
            .and_then(|state| state.get(&key))
            .map(|actual| *actual == expected)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_engine::Concept;
    use concord_types::{ThenClause, WhenClause};
    use serde_json::json;

    fn emitter(name: &str) -> Concept {
        Concept::new(name).on("action1", |ctx, payload| {
            ctx.emit("event1", payload);
        })
    }

    fn receiver(name: &str) -> Concept {
        Concept::new(name)
            .with_state("last_payload", Value::Null)
            .on("receive", |ctx, payload| {
                ctx.set("last_payload", payload);
            })
    }

    fn record(name: &str, source: &str, target: &str, payload: Value) -> RuleRecord {
        RuleRecord {
            name: name.to_string(),
            when: WhenClause {
                source: source.to_string(),
                event: "event1".to_string(),
            },
            where_: None,
            then: vec![ThenClause {
                target: target.to_string(),
                action: "receive".to_string(),
                payload: payload.as_object().unwrap().clone(),
            }],
        }
    }

    #[test]
    fn test_load_registers_in_order() {
        let mut runner = Runner::new();
        runner.register_concept(emitter("C1")).unwrap();
        runner.register_concept(receiver("C2")).unwrap();

        let rules = RuleSet {
            synchronizations: vec![record("TestSync", "C1", "C2", json!({"const": 123}))],
        };

        let count = load_rules(&mut runner, &rules).unwrap();
        assert_eq!(count, 1);
        assert_eq!(runner.stats().synchronizations, 1);
    }

    #[test]
    fn test_payload_mapping_references_and_literals() {
        let mut runner = Runner::new();
        let c1 = runner.register_concept(emitter("C1")).unwrap();
        let c2 = runner.register_concept(receiver("C2")).unwrap();

        let rules = RuleSet {
            synchronizations: vec![record(
                "TestSync",
                "C1",
                "C2",
                json!({"val": "event.val", "const": 123}),
            )],
        };
        load_rules(&mut runner, &rules).unwrap();

        runner.dispatch(c1, "action1", json!({"val": "hello"})).unwrap();

        let got = runner.concept(c2).unwrap().peek_state("last_payload");
        assert_eq!(got, Some(&json!({"val": "hello", "const": 123})));
    }

    #[test]
    fn test_unknown_concept_rejected_atomically() {
        let mut runner = Runner::new();
        runner.register_concept(emitter("C1")).unwrap();

        let rules = RuleSet {
            synchronizations: vec![
                record("Good", "C1", "C1", json!({})),
                record("Bad", "C1", "Nowhere", json!({})),
            ],
        };

        let err = load_rules(&mut runner, &rules).unwrap_err();
        assert!(matches!(err, RuleError::UnknownConcept { ref concept, .. } if concept == "Nowhere"));
        // nothing registered from the failed load
        assert_eq!(runner.stats().synchronizations, 0);
    }

    #[test]
    fn test_guard_clause_gates_rule() {
        let mut runner = Runner::new();
        let c1 = runner.register_concept(emitter("C1")).unwrap();
        let c2 = runner.register_concept(receiver("C2")).unwrap();
        runner
            .register_concept(Concept::new("Flag").with_state("armed", json!(false)))
            .unwrap();

        let mut rec = record("Gated", "C1", "C2", json!({"fired": true}));
        rec.where_ = Some(GuardClause {
            concept: "Flag".to_string(),
            key: "armed".to_string(),
            equals: json!(true),
        });
        let rules = RuleSet {
            synchronizations: vec![rec],
        };
        load_rules(&mut runner, &rules).unwrap();

        runner.dispatch(c1, "action1", json!({})).unwrap();
        assert_eq!(
            runner.concept(c2).unwrap().peek_state("last_payload"),
            Some(&Value::Null)
        );
    }
}
