//! The dispatch engine
//!
//! The runner owns every registered concept, the active synchronization
//! list, and the invariants. `dispatch` executes an action, drains the
//! emitted events, and propagates them against the rules: all events of
//! one action are queued before any is processed, rules are scanned in
//! registration order per event, and each matched rule's follow-up
//! cascade fully resolves before the next rule on the same event is
//! considered. Propagation is plain synchronous recursion bounded by a
//! depth ceiling; hitting the ceiling drops the remaining cascade and is
//! counted, not raised.
//!
//! Only the outermost dispatch settles the tick: invariants are checked
//! against the post-settlement snapshot, the tick counter advances, and
//! the snapshot is recorded for replay. A cascade of any size is one
//! tick.

mod history;
mod shadow;

pub use history::TickHistory;
pub use shadow::{ShadowRunner, StateDiff};

use crate::bridge::CommandBridge;
use crate::concept::Concept;
use crate::error::{EngineError, Result};
use crate::rules::{Invariant, Synchronization};
use crate::sink::{AuditSink, NoopSink};
use concord_types::{ActionId, ConceptId, GlobalSnapshot, StateMap};
use serde_json::Value;
use std::collections::HashMap;

/// Default propagation depth ceiling
///
/// Deep enough that legitimate cascades never touch it; a ceiling must
/// always exist so rule cycles cannot hang the process.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Counters describing a runner's registered entities and activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerStats {
    /// Registered concepts
    pub concepts: usize,
    /// Active synchronizations
    pub synchronizations: usize,
    /// Registered invariants
    pub invariants: usize,
    /// Current tick
    pub tick: u64,
    /// Cascades dropped at the depth ceiling since construction
    pub depth_ceiling_hits: u64,
}

/// The Concept–Synchronization dispatch engine
///
/// Single-threaded and synchronous: `dispatch` runs to completion,
/// including all cascaded propagation, before returning. There is
/// exactly one entry point for mutation — every controller, internal or
/// external, goes through `dispatch`.
pub struct Runner {
    concepts: HashMap<ConceptId, Concept>,
    names: HashMap<String, ConceptId>,
    synchronizations: Vec<Synchronization>,
    invariants: Vec<Invariant>,
    sink: Box<dyn AuditSink>,
    max_depth: usize,
    tick: u64,
    history: TickHistory,
    started: bool,
    depth_ceiling_hits: u64,
}

impl Runner {
    /// Create a runner with a no-op sink and the default depth ceiling
    pub fn new() -> Self {
        Self {
            concepts: HashMap::new(),
            names: HashMap::new(),
            synchronizations: Vec::new(),
            invariants: Vec::new(),
            sink: Box::new(NoopSink),
            max_depth: DEFAULT_MAX_DEPTH,
            tick: 0,
            history: TickHistory::new(),
            started: false,
            depth_ceiling_hits: 0,
        }
    }

    /// Set the propagation depth ceiling
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Attach an audit sink
    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Register a concept, failing if its name is already taken
    pub fn register_concept(&mut self, concept: Concept) -> Result<ConceptId> {
        if self.names.contains_key(concept.name()) {
            return Err(EngineError::DuplicateName(concept.name().to_string()));
        }
        let id = concept.id();
        self.sink
            .log_concept(id, concept.name(), &concept.state_snapshot());
        tracing::debug!(%id, name = concept.name(), "registered concept");
        self.names.insert(concept.name().to_string(), id);
        self.concepts.insert(id, concept);
        Ok(id)
    }

    /// Append a synchronization to the active rule set
    pub fn register_synchronization(&mut self, sync: Synchronization) {
        self.sink.log_synchronization(&sync.name);
        tracing::debug!(name = %sync.name, when = %sync.when, "registered synchronization");
        self.synchronizations.push(sync);
    }

    /// Register an invariant
    pub fn register_invariant(&mut self, invariant: Invariant) {
        tracing::debug!(name = %invariant.name, "registered invariant");
        self.invariants.push(invariant);
    }

    /// Replace the active synchronization set with an empty one
    ///
    /// Concept state, invariants, and tick history are untouched. Used to
    /// hot-swap rule sets between dispatches.
    pub fn clear_synchronizations(&mut self) {
        tracing::debug!(
            dropped = self.synchronizations.len(),
            "cleared synchronization set"
        );
        self.synchronizations.clear();
    }

    /// Record the tick-0 snapshot and begin history tracking
    ///
    /// Dispatching without `start` works, but no history is recorded and
    /// replay is unavailable.
    pub fn start(&mut self) {
        self.started = true;
        self.tick = 0;
        self.history = TickHistory::new();
        self.history.record(self.global_snapshot());
        self.publish_states();
        tracing::debug!("runner started");
    }

    /// The current tick number
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Look up a concept id by registered name
    pub fn concept_by_name(&self, name: &str) -> Option<ConceptId> {
        self.names.get(name).copied()
    }

    /// Borrow a registered concept
    pub fn concept(&self, id: ConceptId) -> Option<&Concept> {
        self.concepts.get(&id)
    }

    /// Names of all registered concepts (arbitrary order)
    pub fn concept_names(&self) -> impl Iterator<Item = &String> {
        self.names.keys()
    }

    /// Deep-copy snapshot of every concept's state, keyed by id
    pub fn global_snapshot(&self) -> GlobalSnapshot {
        self.concepts
            .iter()
            .map(|(id, concept)| (*id, concept.state_snapshot()))
            .collect()
    }

    /// Counters for observers
    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            concepts: self.concepts.len(),
            synchronizations: self.synchronizations.len(),
            invariants: self.invariants.len(),
            tick: self.tick,
            depth_ceiling_hits: self.depth_ceiling_hits,
        }
    }

    /// Execute an action and settle the resulting tick
    ///
    /// This is the engine's single entry point for mutation. The call
    /// runs the full propagation cascade, then checks every invariant
    /// against the settled snapshot, advances the tick counter, and
    /// records history. On [`EngineError::InvariantViolation`] the tick
    /// is not recorded and state is NOT rolled back.
    pub fn dispatch(&mut self, concept: ConceptId, action: &str, payload: Value) -> Result<()> {
        self.dispatch_at(concept, action, payload, None, 0)?;
        self.settle()
    }

    fn dispatch_at(
        &mut self,
        concept: ConceptId,
        action: &str,
        payload: Value,
        triggered_by: Option<ActionId>,
        depth: usize,
    ) -> Result<()> {
        if depth > self.max_depth {
            self.depth_ceiling_hits += 1;
            tracing::warn!(
                depth,
                max_depth = self.max_depth,
                concept = %concept,
                action,
                "propagation depth ceiling reached, dropping cascade"
            );
            return Ok(());
        }

        let (invocation, events) = {
            let entry = self
                .concepts
                .get_mut(&concept)
                .ok_or(EngineError::UnknownConcept(concept))?;
            let invocation = entry.dispatch(action, payload)?;
            (invocation, entry.collect_events())
        };
        self.sink.log_action(invocation, action, concept, triggered_by);

        // All events of this action are queued before any is processed.
        for event in events {
            self.sink.log_event(&event);
            tracing::trace!(event = %event, depth, "propagating event");

            for i in 0..self.synchronizations.len() {
                let Some(sync) = self.synchronizations.get(i) else {
                    break;
                };
                if !sync.when.matches(&event) {
                    continue;
                }
                let sync = sync.clone();
                if !sync.guard_passes(&self.global_snapshot()) {
                    tracing::trace!(rule = %sync.name, "guard rejected");
                    continue;
                }
                // Each matched rule's cascade fully resolves before the
                // next rule on this event is considered.
                for follow_up in &sync.then {
                    let mapped = follow_up.map_payload(&event);
                    self.dispatch_at(
                        follow_up.target,
                        &follow_up.action,
                        mapped,
                        event.cause,
                        depth + 1,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn settle(&mut self) -> Result<()> {
        let snapshot = self.global_snapshot();
        for invariant in &self.invariants {
            if !invariant.holds(&snapshot) {
                tracing::error!(
                    invariant = %invariant.name,
                    message = %invariant.message,
                    "invariant violated"
                );
                return Err(EngineError::InvariantViolation {
                    name: invariant.name.clone(),
                    message: invariant.message.clone(),
                });
            }
        }
        self.tick += 1;
        if self.started {
            self.history.record(snapshot);
        }
        self.sink.log_tick(self.tick);
        Ok(())
    }

    /// Restore every concept's state to the snapshot recorded at `tick`
    ///
    /// Resets the tick counter and discards the forward history (the
    /// timeline forks). Pure state restoration: no events re-fire.
    pub fn replay(&mut self, tick: u64) -> Result<()> {
        let snapshot = match self.history.get(tick) {
            Some(snapshot) if tick <= self.tick => snapshot.clone(),
            _ => {
                return Err(EngineError::InvalidTick {
                    requested: tick,
                    current: self.tick,
                })
            }
        };
        for (id, state) in snapshot {
            if let Some(concept) = self.concepts.get_mut(&id) {
                concept.restore_state(state);
            }
        }
        self.tick = tick;
        self.history.truncate_after(tick);
        tracing::debug!(tick, "replayed");
        Ok(())
    }

    /// Push every concept's current state to the audit sink
    pub fn publish_states(&mut self) {
        let mut entries: Vec<(ConceptId, String, StateMap)> = self
            .concepts
            .values()
            .map(|c| (c.id(), c.name().to_string(), c.state_snapshot()))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        for (id, name, state) in entries {
            self.sink.log_state(id, &name, &state);
        }
    }

    /// Flush the audit sink's durable state
    pub fn save_audit(&mut self) -> anyhow::Result<()> {
        self.sink.save()
    }

    /// Drain and execute externally queued commands
    ///
    /// Each command resolves its target by concept name and runs through
    /// the normal `dispatch` path as its own tick. Failures are recorded
    /// against the command's handle and never abort the batch. Returns
    /// the number of commands that executed successfully.
    pub fn poll_and_execute_commands(&mut self, bridge: &dyn CommandBridge) -> usize {
        let mut executed = 0;
        for command in bridge.pending_commands() {
            match self.concept_by_name(&command.target) {
                Some(id) => match self.dispatch(id, &command.action, command.payload.clone()) {
                    Ok(()) => {
                        bridge.mark_done(command.handle, None);
                        executed += 1;
                    }
                    Err(err) => {
                        tracing::warn!(
                            handle = %command.handle,
                            target = %command.target,
                            action = %command.action,
                            error = %err,
                            "command failed"
                        );
                        bridge.mark_done(command.handle, Some(err.to_string()));
                    }
                },
                None => {
                    bridge.mark_done(
                        command.handle,
                        Some(format!("concept `{}` not found", command.target)),
                    );
                }
            }
        }
        executed
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("concepts", &self.concepts.len())
            .field("synchronizations", &self.synchronizations.len())
            .field("invariants", &self.invariants.len())
            .field("tick", &self.tick)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
