//! Shadow execution for canary testing
//!
//! Pairs two fully isolated runners — production and candidate — and
//! executes the same dispatch against both, diffing the resulting state
//! of every concept by name. Used to regression-test an alternate
//! concept implementation against the production one with real traffic.

use super::Runner;
use crate::error::{EngineError, Result};
use concord_types::StateMap;
use serde_json::Value;
use std::collections::BTreeSet;

/// One observed divergence between the paired runners
#[derive(Debug, Clone, PartialEq)]
pub struct StateDiff {
    /// Concept name the divergence was observed on
    pub concept: String,
    /// The primary runner's state (None if the concept is absent there)
    pub primary: Option<StateMap>,
    /// The candidate runner's state (None if the concept is absent there)
    pub candidate: Option<StateMap>,
}

/// Two isolated runners fed identical dispatches
///
/// The runners share no mutable state; concepts correspond by name only.
#[derive(Debug)]
pub struct ShadowRunner {
    primary: Runner,
    candidate: Runner,
    /// Divergences accumulated across dispatches, in detection order
    pub diffs: Vec<StateDiff>,
}

impl ShadowRunner {
    /// Pair a primary runner with a candidate
    pub fn new(primary: Runner, candidate: Runner) -> Self {
        Self {
            primary,
            candidate,
            diffs: Vec::new(),
        }
    }

    /// Borrow the primary runner
    pub fn primary(&self) -> &Runner {
        &self.primary
    }

    /// Borrow the candidate runner
    pub fn candidate(&self) -> &Runner {
        &self.candidate
    }

    /// Execute the same action on both runners and diff all state
    ///
    /// The target concept is resolved by name on each side; it must exist
    /// in both. Both dispatches always run; if either errors, the first
    /// error is returned after the state diff is taken.
    pub fn dispatch(&mut self, concept: &str, action: &str, payload: Value) -> Result<()> {
        let primary_id = self
            .primary
            .concept_by_name(concept)
            .ok_or_else(|| EngineError::ShadowConcept(concept.to_string()))?;
        let candidate_id = self
            .candidate
            .concept_by_name(concept)
            .ok_or_else(|| EngineError::ShadowConcept(concept.to_string()))?;

        let primary_result = self.primary.dispatch(primary_id, action, payload.clone());
        let candidate_result = self.candidate.dispatch(candidate_id, action, payload);

        self.collect_diffs();

        primary_result?;
        candidate_result
    }

    fn collect_diffs(&mut self) {
        let names: BTreeSet<String> = self
            .primary
            .concept_names()
            .chain(self.candidate.concept_names())
            .cloned()
            .collect();

        for name in names {
            let primary = self
                .primary
                .concept_by_name(&name)
                .and_then(|id| self.primary.concept(id))
                .map(|c| c.state_snapshot());
            let candidate = self
                .candidate
                .concept_by_name(&name)
                .and_then(|id| self.candidate.concept(id))
                .map(|c| c.state_snapshot());

            if primary != candidate {
                tracing::warn!(concept = %name, "shadow divergence");
                self.diffs.push(StateDiff {
                    concept: name,
                    primary,
                    candidate,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::Concept;
    use serde_json::json;

    fn counter(step: i64) -> Concept {
        Concept::new("Counter")
            .with_state("count", json!(0))
            .on("increment", move |ctx, _payload| {
                let count = ctx.get("count").and_then(Value::as_i64).unwrap_or(0);
                ctx.set("count", json!(count + step));
            })
    }

    fn runner_with(concept: Concept) -> Runner {
        let mut runner = Runner::new();
        runner.register_concept(concept).unwrap();
        runner
    }

    #[test]
    fn test_divergent_candidate_detected() {
        let mut shadow = ShadowRunner::new(runner_with(counter(1)), runner_with(counter(2)));

        shadow.dispatch("Counter", "increment", json!({})).unwrap();

        assert_eq!(shadow.diffs.len(), 1);
        let diff = &shadow.diffs[0];
        assert_eq!(diff.concept, "Counter");
        assert_eq!(diff.primary.as_ref().unwrap()["count"], json!(1));
        assert_eq!(diff.candidate.as_ref().unwrap()["count"], json!(2));
    }

    #[test]
    fn test_identical_implementations_produce_no_diff() {
        let mut shadow = ShadowRunner::new(runner_with(counter(1)), runner_with(counter(1)));

        shadow.dispatch("Counter", "increment", json!({})).unwrap();
        shadow.dispatch("Counter", "increment", json!({})).unwrap();

        assert!(shadow.diffs.is_empty());
        assert_eq!(
            shadow
                .primary()
                .concept(shadow.primary().concept_by_name("Counter").unwrap())
                .unwrap()
                .peek_state("count"),
            Some(&json!(2))
        );
    }

    #[test]
    fn test_missing_concept_rejected() {
        let mut shadow = ShadowRunner::new(runner_with(counter(1)), Runner::new());
        let err = shadow
            .dispatch("Counter", "increment", json!({}))
            .unwrap_err();
        assert!(matches!(err, EngineError::ShadowConcept(name) if name == "Counter"));
    }
}
