//! Concepts: isolated units of state and behavior
//!
//! A concept owns a private state map and a fixed table of named actions.
//! Actions mutate the state and emit events through an [`ActionContext`];
//! they never see the runner or any other concept. The only channel out
//! of a concept is its event buffer, drained by the runner after each
//! dispatch.

use crate::error::ConceptError;
use concord_types::{ActionId, ConceptId, Event, PayloadSchema, StateMap};
use serde_json::Value;
use std::collections::HashMap;

/// Context passed to action handlers
///
/// Provides mutable access to the concept's private state and the `emit`
/// operation. The context carries the id of the running invocation so
/// that emitted events are causally linked to it.
pub struct ActionContext<'a> {
    concept: ConceptId,
    invocation: ActionId,
    state: &'a mut StateMap,
    outbox: &'a mut Vec<Event>,
}

impl<'a> ActionContext<'a> {
    /// The concept this action runs on
    pub fn concept(&self) -> ConceptId {
        self.concept
    }

    /// The id of this invocation
    pub fn invocation(&self) -> ActionId {
        self.invocation
    }

    /// Read a state key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Write a state key
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Mutable access to the whole state map
    pub fn state_mut(&mut self) -> &mut StateMap {
        self.state
    }

    /// Emit an event from this concept
    ///
    /// The event is buffered; the runner drains the buffer after the
    /// action body returns and routes the events to synchronizations.
    pub fn emit(&mut self, name: impl Into<String>, payload: Value) {
        self.outbox
            .push(Event::caused_by(name, self.concept, payload, self.invocation));
    }
}

/// A named action: optional payload schema plus the handler body
pub struct Action {
    schema: Option<PayloadSchema>,
    handler: Box<dyn FnMut(&mut ActionContext<'_>, Value)>,
}

impl Action {
    /// Create an action without a payload schema
    pub fn new(handler: impl FnMut(&mut ActionContext<'_>, Value) + 'static) -> Self {
        Self {
            schema: None,
            handler: Box::new(handler),
        }
    }

    /// Create an action whose payload is validated against `schema`
    pub fn validated(
        schema: PayloadSchema,
        handler: impl FnMut(&mut ActionContext<'_>, Value) + 'static,
    ) -> Self {
        Self {
            schema: Some(schema),
            handler: Box::new(handler),
        }
    }
}

/// An isolated unit of state and behavior
///
/// Concepts are constructed builder-style and registered with exactly one
/// runner. Action handlers are looked up by name in an explicit table;
/// there is no reflection.
///
/// # Example
///
/// ```
/// use concord_engine::Concept;
/// use serde_json::json;
///
/// let user = Concept::new("User")
///     .with_state("is_logged_in", json!(false))
///     .on("login", |ctx, payload| {
///         ctx.set("is_logged_in", json!(true));
///         ctx.emit("LoggedIn", payload);
///     });
/// ```
pub struct Concept {
    id: ConceptId,
    name: String,
    state: StateMap,
    actions: HashMap<String, Action>,
    outbox: Vec<Event>,
}

impl Concept {
    /// Create a concept with the given human-readable name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ConceptId::new(),
            name: name.into(),
            state: StateMap::new(),
            actions: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    /// Seed one state key
    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state.insert(key.into(), value);
        self
    }

    /// Declare an action without a payload schema
    pub fn on(
        mut self,
        action: impl Into<String>,
        handler: impl FnMut(&mut ActionContext<'_>, Value) + 'static,
    ) -> Self {
        self.actions.insert(action.into(), Action::new(handler));
        self
    }

    /// Declare an action with a payload schema
    ///
    /// The payload is validated and coerced before the handler runs; a
    /// schema rejection means the handler never executes.
    pub fn on_validated(
        mut self,
        action: impl Into<String>,
        schema: PayloadSchema,
        handler: impl FnMut(&mut ActionContext<'_>, Value) + 'static,
    ) -> Self {
        self.actions
            .insert(action.into(), Action::validated(schema, handler));
        self
    }

    /// The concept's stable id
    pub fn id(&self) -> ConceptId {
        self.id
    }

    /// The concept's human-readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the declared actions (arbitrary order)
    pub fn action_names(&self) -> impl Iterator<Item = &String> {
        self.actions.keys()
    }

    /// Execute an action by name
    ///
    /// Fails with [`ConceptError::UnknownAction`] if the name is not in
    /// the action table, or [`ConceptError::Payload`] if a declared
    /// schema rejects the payload. Returns the id minted for this
    /// invocation; events emitted by the handler carry it as `cause`.
    pub fn dispatch(&mut self, action: &str, payload: Value) -> Result<ActionId, ConceptError> {
        let entry = self
            .actions
            .get_mut(action)
            .ok_or_else(|| ConceptError::UnknownAction {
                concept: self.name.clone(),
                action: action.to_string(),
            })?;

        let payload = match &entry.schema {
            Some(schema) => schema.validate(payload)?,
            None => payload,
        };

        let invocation = ActionId::new();
        let mut ctx = ActionContext {
            concept: self.id,
            invocation,
            state: &mut self.state,
            outbox: &mut self.outbox,
        };
        (entry.handler)(&mut ctx, payload);
        Ok(invocation)
    }

    /// Drain and return the buffered events (destructive read)
    pub fn collect_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    /// An independent deep copy of the state
    ///
    /// Mutating the returned map never affects the concept.
    pub fn state_snapshot(&self) -> StateMap {
        self.state.clone()
    }

    /// Read one state key without copying the whole map
    pub fn peek_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Replace the state wholesale (used by replay)
    pub(crate) fn restore_state(&mut self, state: StateMap) {
        self.state = state;
    }
}

impl std::fmt::Debug for Concept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Concept")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("buffered_events", &self.outbox.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::FieldKind;
    use serde_json::json;

    fn counter() -> Concept {
        Concept::new("Counter")
            .with_state("count", json!(0))
            .on("increment", |ctx, payload| {
                let amount = payload
                    .as_object()
                    .and_then(|p| p.get("amount"))
                    .and_then(Value::as_i64)
                    .unwrap_or(1);
                let count = ctx.get("count").and_then(Value::as_i64).unwrap_or(0);
                ctx.set("count", json!(count + amount));
                ctx.emit("Incremented", json!({"new_count": count + amount}));
            })
    }

    #[test]
    fn test_dispatch_mutates_state() {
        let mut c = counter();
        c.dispatch("increment", json!({"amount": 5})).unwrap();
        assert_eq!(c.peek_state("count"), Some(&json!(5)));
    }

    #[test]
    fn test_collect_events_drains() {
        let mut c = counter();
        c.dispatch("increment", json!({"amount": 1})).unwrap();

        let events = c.collect_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Incremented");
        assert_eq!(events[0].source, c.id());
        assert_eq!(events[0].payload, json!({"new_count": 1}));

        assert!(c.collect_events().is_empty());
    }

    #[test]
    fn test_event_carries_invocation_cause() {
        let mut c = counter();
        let invocation = c.dispatch("increment", json!({})).unwrap();
        let events = c.collect_events();
        assert_eq!(events[0].cause, Some(invocation));
    }

    #[test]
    fn test_unknown_action() {
        let mut c = counter();
        let err = c.dispatch("non_existent", json!({})).unwrap_err();
        assert!(matches!(err, ConceptError::UnknownAction { ref action, .. } if action == "non_existent"));
    }

    #[test]
    fn test_snapshot_immutability() {
        let mut c = counter();
        let mut snapshot = c.state_snapshot();
        snapshot.insert("count".to_string(), json!(999));
        assert_eq!(c.peek_state("count"), Some(&json!(0)));
        c.dispatch("increment", json!({})).unwrap();
        assert_eq!(snapshot.get("count"), Some(&json!(999)));
    }

    #[test]
    fn test_validated_action_coerces() {
        let schema = PayloadSchema::new()
            .field("x", FieldKind::Integer)
            .field("y", FieldKind::Integer);
        let mut player = Concept::new("Player").on_validated("move", schema, |ctx, payload| {
            ctx.emit("moved", payload);
        });

        player.dispatch("move", json!({"x": "10", "y": 20})).unwrap();
        let events = player.collect_events();
        assert_eq!(events[0].payload, json!({"x": 10, "y": 20}));
    }

    #[test]
    fn test_validated_action_rejects_without_running() {
        let schema = PayloadSchema::new().field("x", FieldKind::Integer);
        let mut player = Concept::new("Player")
            .with_state("moves", json!(0))
            .on_validated("move", schema, |ctx, _payload| {
                let moves = ctx.get("moves").and_then(Value::as_i64).unwrap_or(0);
                ctx.set("moves", json!(moves + 1));
            });

        let err = player.dispatch("move", json!({"x": "invalid"})).unwrap_err();
        assert!(matches!(err, ConceptError::Payload(_)));
        // handler must not have run
        assert_eq!(player.peek_state("moves"), Some(&json!(0)));
        assert!(player.collect_events().is_empty());
    }
}
