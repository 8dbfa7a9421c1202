//! Concord - Concept-Synchronization dispatch engine
//!
//! This crate provides the event-driven dispatch engine at the heart of
//! the Concept-Synchronization (C-S) architecture: independent
//! state-owning units ([`Concept`]) communicate exclusively through
//! emitted events, and a central coordinator ([`Runner`]) matches those
//! events against declarative rules ([`Synchronization`]) to invoke
//! further actions on other concepts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Runner                              │
//! │  (dispatch loop, tick history, invariants, audit sink)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │   dispatch(target, action, payload)                          │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  ┌──────────┐   emit    ┌────────────────────┐               │
//! │  │ Concept  │──────────▶│   event queue      │               │
//! │  └──────────┘           └─────────┬──────────┘               │
//! │        ▲                          │ match (registration      │
//! │        │ follow-up dispatch       │ order, guarded)          │
//! │        │                          ▼                          │
//! │        │                ┌────────────────────┐               │
//! │        └────────────────│  Synchronizations  │               │
//! │                         └────────────────────┘               │
//! │                                                              │
//! │  after settlement: Invariants ✓, tick += 1, snapshot         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core concepts
//!
//! ## Concepts
//!
//! A [`Concept`] owns a private state map and a fixed table of named
//! actions. A concept never reads another concept's state; the only
//! inter-concept channel is events routed by the runner.
//!
//! ## Synchronizations
//!
//! A [`Synchronization`] binds one exact-match event pattern, optionally
//! gated by a guard over the global snapshot, to an ordered list of
//! follow-up [`ActionInvocation`]s. Propagation is synchronous recursion
//! bounded by a depth ceiling.
//!
//! ## Ticks and replay
//!
//! One outermost dispatch — including every cascaded reaction — settles
//! as exactly one tick. The runner records a full snapshot per tick;
//! [`Runner::replay`] restores any recorded tick without re-executing
//! side effects.
//!
//! ## Boundary interfaces
//!
//! [`AuditSink`] receives registration/dispatch/event hooks (the engine
//! works with [`NoopSink`]); [`CommandBridge`] lets external controllers
//! queue commands that execute through the one and only dispatch path;
//! [`ShadowRunner`] pairs two engines for canary diffing.
//!
//! # Example
//!
//! ```
//! use concord_engine::{ActionInvocation, Concept, Runner, Synchronization};
//! use concord_types::EventPattern;
//! use serde_json::json;
//!
//! let mut runner = Runner::new();
//!
//! let user = runner
//!     .register_concept(
//!         Concept::new("User")
//!             .with_state("is_logged_in", json!(false))
//!             .on("login", |ctx, payload| {
//!                 ctx.set("is_logged_in", json!(true));
//!                 ctx.emit("LoggedIn", payload);
//!             }),
//!     )
//!     .unwrap();
//!
//! let audit = runner
//!     .register_concept(
//!         Concept::new("Audit")
//!             .with_state("entries", json!(0))
//!             .on("log_access", |ctx, _payload| {
//!                 let n = ctx.get("entries").and_then(|v| v.as_i64()).unwrap_or(0);
//!                 ctx.set("entries", json!(n + 1));
//!             }),
//!     )
//!     .unwrap();
//!
//! runner.register_synchronization(
//!     Synchronization::new("LogAccessOnLogin", EventPattern::new(user, "LoggedIn"))
//!         .then(ActionInvocation::forwarding(audit, "log_access")),
//! );
//!
//! runner.start();
//! runner.dispatch(user, "login", json!({"username": "alice"})).unwrap();
//!
//! assert_eq!(runner.tick(), 1);
//! ```

pub mod bridge;
pub mod concept;
pub mod error;
pub mod rules;
pub mod runner;
pub mod sink;

pub use bridge::{Command, CommandBridge, CommandStatus, InMemoryCommandQueue};
pub use concept::{Action, ActionContext, Concept};
pub use error::{ConceptError, EngineError, Result};
pub use rules::{ActionInvocation, Guard, Invariant, PayloadMapper, Synchronization};
pub use runner::{Runner, RunnerStats, ShadowRunner, StateDiff, TickHistory, DEFAULT_MAX_DEPTH};
pub use sink::{AuditSink, CollectingSink, NoopSink, TracingSink};
