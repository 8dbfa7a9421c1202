//! Declarative rule records
//!
//! The serde-facing model of a synchronization rule set. External tooling
//! deserializes rule files (whatever the concrete format) into these
//! records; the rule loader compiles them into registered
//! synchronizations. Concepts are referred to by name here — resolution
//! to ids happens at load time.
//!
//! Payload mapping convention: a string value of the form `"event.<field>"`
//! references that field of the triggering event's payload; every other
//! value is passed through as a literal constant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A complete rule set, as produced by deserializing a rule file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// The rules, in the order they should be registered
    pub synchronizations: Vec<RuleRecord>,
}

/// One declarative synchronization rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Rule name, for diagnostics and audit logs
    pub name: String,
    /// The event pattern that triggers this rule
    pub when: WhenClause,
    /// Optional guard over global state; the rule fires only if it holds
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_: Option<GuardClause>,
    /// Follow-up action invocations, executed in order
    #[serde(default)]
    pub then: Vec<ThenClause>,
}

/// Event pattern of a rule record: concept name plus event name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenClause {
    /// Name of the emitting concept
    pub source: String,
    /// Event name to match
    pub event: String,
}

/// Declarative guard: one state key of one concept must equal a value
///
/// Richer predicates require constructing the synchronization
/// programmatically with a closure guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardClause {
    /// Name of the concept whose state is inspected
    pub concept: String,
    /// State key to compare
    pub key: String,
    /// Value the key must equal for the rule to fire
    pub equals: Value,
}

/// One follow-up action of a rule record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThenClause {
    /// Name of the target concept
    pub target: String,
    /// Action to invoke on the target
    pub action: String,
    /// Payload mapping: literal constants and `"event.<field>"` references
    #[serde(default)]
    pub payload: serde_json::Map<String, Value>,
}

/// Interpret one payload-mapping value against a triggering event payload
///
/// `"event.<field>"` strings resolve to the named field (null if absent
/// or if the payload is not an object); everything else is literal.
pub fn map_payload_value(value: &Value, event_payload: &Value) -> Value {
    if let Value::String(s) = value {
        if let Some(field) = s.strip_prefix("event.") {
            return event_payload
                .as_object()
                .and_then(|map| map.get(field))
                .cloned()
                .unwrap_or(Value::Null);
        }
    }
    value.clone()
}
