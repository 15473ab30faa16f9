//! Round tracking for the drain loop

use crate::core::descriptor::TestDescriptor;
use std::collections::HashSet;

/// Tests seen since the last completed round
///
/// Seeing a test twice means every queued test was tried once without the
/// queue draining, usually because their integration instances are locked
/// by another runner. The loop then cools down and starts a new round.
///
/// This only detects "no progress" when tests are never re-enqueued after
/// they were classified. A queue that re-enqueues turns the cooldown into a
/// fixed poll.
#[derive(Debug, Default)]
pub struct RoundTracker {
    seen: HashSet<TestDescriptor>,
    completed_rounds: usize,
}

impl RoundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `descriptor` was dequeued
    ///
    /// Returns `true` when this completes a round; the set then restarts
    /// with only `descriptor` in it.
    pub fn observe(&mut self, descriptor: &TestDescriptor) -> bool {
        let round_completed = self.seen.contains(descriptor);
        if round_completed {
            self.seen.clear();
            self.completed_rounds += 1;
        }
        self.seen.insert(descriptor.clone());
        round_completed
    }

    pub fn completed_rounds(&self) -> usize {
        self.completed_rounds
    }

    pub fn seen_in_round(&self) -> usize {
        self.seen.len()
    }
}
