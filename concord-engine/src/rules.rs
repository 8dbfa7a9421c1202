//! Synchronizations and invariants
//!
//! A synchronization binds one event pattern, optionally gated by a
//! predicate over the global state snapshot, to an ordered sequence of
//! follow-up action invocations. An invariant is a global predicate
//! checked after every settled dispatch.
//!
//! Guards and payload mappers are plain closures behind `Arc`, so rules
//! are cheap to clone and side-effect-free to construct.

use concord_types::{ConceptId, Event, EventPattern, GlobalSnapshot};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Pure function from a triggering event to the payload of a follow-up action
pub type PayloadMapper = Arc<dyn Fn(&Event) -> Value>;

/// Read-only predicate over the global state snapshot
pub type Guard = Arc<dyn Fn(&GlobalSnapshot) -> bool>;

/// A follow-up action of a synchronization
///
/// Constructing an invocation has no side effects; applying it is the
/// runner's job.
#[derive(Clone)]
pub struct ActionInvocation {
    /// The concept to dispatch on
    pub target: ConceptId,
    /// The action to invoke
    pub action: String,
    mapper: PayloadMapper,
}

impl ActionInvocation {
    /// Create an invocation with a payload mapper
    pub fn new(
        target: ConceptId,
        action: impl Into<String>,
        mapper: impl Fn(&Event) -> Value + 'static,
    ) -> Self {
        Self {
            target,
            action: action.into(),
            mapper: Arc::new(mapper),
        }
    }

    /// Create an invocation that forwards the triggering event's payload
    pub fn forwarding(target: ConceptId, action: impl Into<String>) -> Self {
        Self::new(target, action, |event| event.payload.clone())
    }

    /// Compute the payload for the given triggering event
    pub fn map_payload(&self, event: &Event) -> Value {
        (self.mapper)(event)
    }
}

impl fmt::Debug for ActionInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInvocation")
            .field("target", &self.target)
            .field("action", &self.action)
            .finish()
    }
}

/// A declarative rule: when an event matches, invoke follow-up actions
///
/// The `where` guard, if present, is evaluated against a fresh global
/// snapshot at match time; if it returns false the rule does not fire for
/// that event, but other synchronizations are still evaluated.
#[derive(Clone)]
pub struct Synchronization {
    /// Rule name, for diagnostics and audit logs
    pub name: String,
    /// The triggering event pattern
    pub when: EventPattern,
    guard: Option<Guard>,
    /// Follow-up invocations, executed in order
    pub then: Vec<ActionInvocation>,
}

impl Synchronization {
    /// Create a rule with no guard and no follow-ups
    pub fn new(name: impl Into<String>, when: EventPattern) -> Self {
        Self {
            name: name.into(),
            when,
            guard: None,
            then: Vec::new(),
        }
    }

    /// Attach a guard predicate
    pub fn with_guard(mut self, guard: impl Fn(&GlobalSnapshot) -> bool + 'static) -> Self {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Append one follow-up invocation
    pub fn then(mut self, invocation: ActionInvocation) -> Self {
        self.then.push(invocation);
        self
    }

    /// Whether the guard (if any) passes for the given snapshot
    pub fn guard_passes(&self, snapshot: &GlobalSnapshot) -> bool {
        match &self.guard {
            Some(guard) => guard(snapshot),
            None => true,
        }
    }

    /// Whether this rule has a guard
    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }
}

impl fmt::Debug for Synchronization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronization")
            .field("name", &self.name)
            .field("when", &self.when)
            .field("guarded", &self.guard.is_some())
            .field("then", &self.then)
            .finish()
    }
}

/// A global state predicate checked after every settled tick
#[derive(Clone)]
pub struct Invariant {
    /// Invariant name
    pub name: String,
    check: Arc<dyn Fn(&GlobalSnapshot) -> bool>,
    /// Human-readable message reported on violation
    pub message: String,
}

impl Invariant {
    /// Create an invariant
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&GlobalSnapshot) -> bool + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
            message: message.into(),
        }
    }

    /// Evaluate the predicate against a snapshot
    pub fn holds(&self, snapshot: &GlobalSnapshot) -> bool {
        (self.check)(snapshot)
    }
}

impl fmt::Debug for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invariant")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish()
    }
}
