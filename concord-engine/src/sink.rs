//! Audit sink interface
//!
//! The runner reports registrations, dispatches, events, and settled
//! ticks to an [`AuditSink`]. What the sink does with them — RDF graphs,
//! flat files, nothing — is its own business; the engine is fully
//! functional with [`NoopSink`].

use concord_types::{ActionId, ConceptId, Event, StateMap};
use parking_lot::Mutex;
use std::sync::Arc;

/// Hooks called by the runner during registration and dispatch
///
/// All methods default to no-ops so sinks only implement what they care
/// about. `save` flushes durable state, if the sink has any.
pub trait AuditSink {
    /// A concept was registered
    fn log_concept(&mut self, id: ConceptId, name: &str, state: &StateMap) {
        let _ = (id, name, state);
    }

    /// A synchronization was registered
    fn log_synchronization(&mut self, name: &str) {
        let _ = name;
    }

    /// An action was invoked
    ///
    /// `triggered_by` is the invocation that emitted the event which led
    /// here, absent for externally initiated dispatches.
    fn log_action(
        &mut self,
        id: ActionId,
        name: &str,
        concept: ConceptId,
        triggered_by: Option<ActionId>,
    ) {
        let _ = (id, name, concept, triggered_by);
    }

    /// An event entered propagation
    fn log_event(&mut self, event: &Event) {
        let _ = event;
    }

    /// A tick settled
    fn log_tick(&mut self, tick: u64) {
        let _ = tick;
    }

    /// A concept's state was published for external observers
    fn log_state(&mut self, id: ConceptId, name: &str, state: &StateMap) {
        let _ = (id, name, state);
    }

    /// Flush durable state
    fn save(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl AuditSink for NoopSink {}

/// A sink that forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn log_concept(&mut self, id: ConceptId, name: &str, _state: &StateMap) {
        tracing::info!(%id, name, "registered concept");
    }

    fn log_synchronization(&mut self, name: &str) {
        tracing::info!(name, "registered synchronization");
    }

    fn log_action(
        &mut self,
        id: ActionId,
        name: &str,
        concept: ConceptId,
        triggered_by: Option<ActionId>,
    ) {
        match triggered_by {
            Some(cause) => tracing::debug!(%id, name, %concept, %cause, "action"),
            None => tracing::debug!(%id, name, %concept, "action"),
        }
    }

    fn log_event(&mut self, event: &Event) {
        tracing::debug!(name = %event.name, source = %event.source, "event");
    }

    fn log_tick(&mut self, tick: u64) {
        tracing::debug!(tick, "tick settled");
    }

    fn log_state(&mut self, id: ConceptId, name: &str, state: &StateMap) {
        tracing::debug!(%id, name, keys = state.len(), "state published");
    }
}

/// Shared sinks: the runner holds one clone, the observer another
impl<S: AuditSink> AuditSink for Arc<Mutex<S>> {
    fn log_concept(&mut self, id: ConceptId, name: &str, state: &StateMap) {
        self.lock().log_concept(id, name, state);
    }

    fn log_synchronization(&mut self, name: &str) {
        self.lock().log_synchronization(name);
    }

    fn log_action(
        &mut self,
        id: ActionId,
        name: &str,
        concept: ConceptId,
        triggered_by: Option<ActionId>,
    ) {
        self.lock().log_action(id, name, concept, triggered_by);
    }

    fn log_event(&mut self, event: &Event) {
        self.lock().log_event(event);
    }

    fn log_tick(&mut self, tick: u64) {
        self.lock().log_tick(tick);
    }

    fn log_state(&mut self, id: ConceptId, name: &str, state: &StateMap) {
        self.lock().log_state(id, name, state);
    }

    fn save(&mut self) -> anyhow::Result<()> {
        self.lock().save()
    }
}

/// A sink that records everything in memory, for tests and debugging
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    /// Names of registered concepts, in registration order
    pub concepts: Vec<String>,
    /// Names of registered synchronizations, in registration order
    pub synchronizations: Vec<String>,
    /// (action name, concept, triggered_by) per invocation, in execution order
    pub actions: Vec<(String, ConceptId, Option<ActionId>)>,
    /// Events in propagation order
    pub events: Vec<Event>,
    /// Settled tick numbers
    pub ticks: Vec<u64>,
    /// Number of `save` calls
    pub saves: usize,
}

impl CollectingSink {
    /// Create an empty collecting sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for CollectingSink {
    fn log_concept(&mut self, _id: ConceptId, name: &str, _state: &StateMap) {
        self.concepts.push(name.to_string());
    }

    fn log_synchronization(&mut self, name: &str) {
        self.synchronizations.push(name.to_string());
    }

    fn log_action(
        &mut self,
        _id: ActionId,
        name: &str,
        concept: ConceptId,
        triggered_by: Option<ActionId>,
    ) {
        self.actions.push((name.to_string(), concept, triggered_by));
    }

    fn log_event(&mut self, event: &Event) {
        self.events.push(event.clone());
    }

    fn log_tick(&mut self, tick: u64) {
        self.ticks.push(tick);
    }

    fn save(&mut self) -> anyhow::Result<()> {
        self.saves += 1;
        Ok(())
    }
}
