//! Core type definitions for the concord engine
//!
//! These are the foundational identity and value types used throughout
//! the Concept–Synchronization runtime: stable identifiers for concepts
//! and action invocations, the immutable [`Event`] fact, the exact-match
//! [`EventPattern`], optional payload schemas, and the declarative
//! rule-record model consumed by the rule loader.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub mod records;
pub mod schema;

pub use records::{GuardClause, RuleRecord, RuleSet, ThenClause, WhenClause};
pub use schema::{FieldKind, PayloadError, PayloadSchema};

/// A concept's private state: a mapping from string keys to structured values.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// A point-in-time copy of every registered concept's state, keyed by id.
///
/// Snapshots are always deep copies; holders may mutate them freely
/// without affecting any concept.
pub type GlobalSnapshot = BTreeMap<ConceptId, StateMap>;

/// Stable unique identifier for a concept
///
/// Assigned at construction and never reused. The human-readable name is
/// tracked separately by the runner; the id is what events and patterns
/// refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptId(pub Uuid);

impl ConceptId {
    /// Create a new unique concept id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConceptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c:{}", &self.0.to_string()[..8])
    }
}

/// Identifier for one action invocation
///
/// A fresh id is minted every time an action body runs; events emitted
/// during that run carry it as their causal link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    /// Create a new unique action id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a:{}", &self.0.to_string()[..8])
    }
}

/// Handle for a command queued through the command bridge
///
/// Unforgeable token returned to the external controller when a command
/// is enqueued, used to observe the command's outcome later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandHandle(pub Uuid);

impl CommandHandle {
    /// Create a new unique command handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommandHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd:{}", &self.0.to_string()[..8])
    }
}

/// An immutable fact broadcast by a concept
///
/// Events exist only within the propagation window of one dispatch; the
/// runner's audit sink may persist them afterwards. `cause` links the
/// event to the action invocation whose body emitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event name, matched exactly by patterns
    pub name: String,
    /// The concept that emitted this event
    pub source: ConceptId,
    /// Structured payload (schema-validated where the emitting action declares one)
    pub payload: serde_json::Value,
    /// The action invocation that produced this event, if tracked
    pub cause: Option<ActionId>,
}

impl Event {
    /// Construct an event with no causal link
    pub fn new(name: impl Into<String>, source: ConceptId, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            source,
            payload,
            cause: None,
        }
    }

    /// Construct an event caused by the given action invocation
    pub fn caused_by(
        name: impl Into<String>,
        source: ConceptId,
        payload: serde_json::Value,
        cause: ActionId,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            payload,
            cause: Some(cause),
        }
    }

    /// Read a field of the payload, if the payload is an object
    pub fn payload_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.as_object().and_then(|map| map.get(key))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.source)
    }
}

/// Match predicate over events: source concept and event name, both exact
///
/// No wildcards. Two patterns are equal iff they match the same events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPattern {
    /// The emitting concept to match
    pub source: ConceptId,
    /// The event name to match
    pub event: String,
}

impl EventPattern {
    /// Create a pattern matching `event` emitted by `source`
    pub fn new(source: ConceptId, event: impl Into<String>) -> Self {
        Self {
            source,
            event: event.into(),
        }
    }

    /// Test whether this pattern matches the given event
    pub fn matches(&self, event: &Event) -> bool {
        self.source == event.source && self.event == event.name
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event, self.source)
    }
}
