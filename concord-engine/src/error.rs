//! Error types for the concord engine

use concord_types::{ConceptId, PayloadError};
use thiserror::Error;

/// Errors raised by a concept during action dispatch
#[derive(Debug, Error)]
pub enum ConceptError {
    /// The concept declares no action by this name
    #[error("unknown action `{action}` on concept `{concept}`")]
    UnknownAction {
        /// Name of the concept
        concept: String,
        /// The requested action name
        action: String,
    },

    /// The action's payload schema rejected the payload
    #[error("payload rejected: {0}")]
    Payload(#[from] PayloadError),
}

/// Top-level engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// No concept with this id is registered
    #[error("unknown concept {0}")]
    UnknownConcept(ConceptId),

    /// A concept with this name is already registered
    #[error("concept name `{0}` already registered")]
    DuplicateName(String),

    /// The dispatched concept rejected the action
    #[error(transparent)]
    Concept(#[from] ConceptError),

    /// An invariant did not hold after the tick settled
    ///
    /// Concept state mutated during the violating tick is NOT rolled
    /// back; callers must not assume transactional semantics.
    #[error("invariant violation: {name}: {message}")]
    InvariantViolation {
        /// Name of the violated invariant
        name: String,
        /// The invariant's human-readable message
        message: String,
    },

    /// Replay target outside the recorded history
    #[error("invalid tick {requested}: current tick is {current}")]
    InvalidTick {
        /// The requested tick number
        requested: u64,
        /// The runner's current tick
        current: u64,
    },

    /// A shadow dispatch named a concept missing from one of the runners
    #[error("concept `{0}` not present in both shadow runners")]
    ShadowConcept(String),
}

/// Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
