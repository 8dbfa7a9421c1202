//! Tick history for deterministic replay
//!
//! The runner records a full global snapshot after every settled tick.
//! Entry `k` is the state immediately after tick `k`; entry 0 is the
//! state at `start()`. Replaying to tick `k` restores that snapshot
//! bit-for-bit and discards the forward entries, forking the timeline.

use concord_types::GlobalSnapshot;

/// Ordered sequence of recorded tick snapshots
#[derive(Debug, Clone, Default)]
pub struct TickHistory {
    snapshots: Vec<GlobalSnapshot>,
}

impl TickHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the snapshot for the next tick
    pub fn record(&mut self, snapshot: GlobalSnapshot) {
        self.snapshots.push(snapshot);
    }

    /// The snapshot recorded at `tick`, if present
    pub fn get(&self, tick: u64) -> Option<&GlobalSnapshot> {
        usize::try_from(tick).ok().and_then(|i| self.snapshots.get(i))
    }

    /// Number of recorded snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Drop every snapshot after `tick`, keeping entries `0..=tick`
    pub fn truncate_after(&mut self, tick: u64) {
        let keep = usize::try_from(tick)
            .map(|t| t.saturating_add(1))
            .unwrap_or(usize::MAX);
        self.snapshots.truncate(keep);
    }
}
