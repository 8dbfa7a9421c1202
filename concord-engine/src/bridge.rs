//! Command queue bridge
//!
//! Lets an external controller — human, scripted, or a remote process —
//! enqueue `(target, action, payload)` commands and later observe their
//! outcomes, without the engine depending on any transport or encoding.
//! The runner drains the bridge through its single `dispatch` entry
//! point; a failing command is recorded against its handle and never
//! takes the batch down.

use concord_types::CommandHandle;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// One externally queued command
#[derive(Debug, Clone)]
pub struct Command {
    /// Handle identifying this command to the controller
    pub handle: CommandHandle,
    /// Target concept, by name
    pub target: String,
    /// Action to invoke
    pub action: String,
    /// Payload to dispatch with
    pub payload: Value,
}

/// Outcome of a processed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    /// Not yet processed
    Pending,
    /// Executed successfully
    Done,
    /// Execution failed with the recorded message
    Failed(String),
}

/// The engine-facing contract of a command queue
///
/// `&self` methods with interior mutability, so a queue can be shared
/// between the controller and the runner.
pub trait CommandBridge {
    /// Commands not yet processed, in enqueue order
    fn pending_commands(&self) -> Vec<Command>;

    /// Record a command's outcome: `None` for success, or an error message
    fn mark_done(&self, handle: CommandHandle, error: Option<String>);
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: Vec<Command>,
    statuses: HashMap<CommandHandle, CommandStatus>,
}

/// In-memory command queue
///
/// Wrap it in an `Arc` and hand one clone to the controller and one to
/// the dispatch loop.
#[derive(Debug, Default)]
pub struct InMemoryCommandQueue {
    inner: Mutex<QueueInner>,
}

impl InMemoryCommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command and return its handle
    pub fn push(
        &self,
        target: impl Into<String>,
        action: impl Into<String>,
        payload: Value,
    ) -> CommandHandle {
        let handle = CommandHandle::new();
        let mut inner = self.inner.lock();
        inner.pending.push(Command {
            handle,
            target: target.into(),
            action: action.into(),
            payload,
        });
        inner.statuses.insert(handle, CommandStatus::Pending);
        handle
    }

    /// The recorded status of a command, if the handle is known
    pub fn status(&self, handle: CommandHandle) -> Option<CommandStatus> {
        self.inner.lock().statuses.get(&handle).cloned()
    }

    /// Number of commands awaiting processing
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl CommandBridge for InMemoryCommandQueue {
    fn pending_commands(&self) -> Vec<Command> {
        self.inner.lock().pending.clone()
    }

    fn mark_done(&self, handle: CommandHandle, error: Option<String>) {
        let mut inner = self.inner.lock();
        inner.pending.retain(|cmd| cmd.handle != handle);
        let status = match error {
            None => CommandStatus::Done,
            Some(message) => CommandStatus::Failed(message),
        };
        inner.statuses.insert(handle, status);
    }
}
