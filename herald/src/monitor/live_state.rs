//! Process-local record of streamers currently believed live.
//!
//! The set is the authority for edge detection: a name is present iff the
//! last poll observed it live and no later poll observed it offline. It is
//! deliberately not persisted; a restart starts empty and the recency guard
//! in the poller keeps long-running streams from re-notifying.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Shared live set. Mutated only by the polling cycle; read concurrently by
/// the admin API and the guild configuration service.
#[derive(Debug, Default)]
pub struct LiveStateTracker {
    live: RwLock<HashSet<String>>,
}

impl LiveStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker seeded with names already considered live. Used by tests and
    /// never in production, where restarts intentionally start empty.
    pub fn with_live<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let live = names
            .into_iter()
            .map(|n| n.into().to_lowercase())
            .collect();
        Self {
            live: RwLock::new(live),
        }
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.live.read().contains(&name.to_lowercase())
    }

    /// Insert a name; `true` when this is an offline→live transition.
    pub fn mark_live(&self, name: &str) -> bool {
        self.live.write().insert(name.to_lowercase())
    }

    /// Remove a name; `true` when this is a live→offline transition.
    pub fn mark_offline(&self, name: &str) -> bool {
        self.live.write().remove(&name.to_lowercase())
    }

    /// Copy of the current live set.
    pub fn snapshot(&self) -> HashSet<String> {
        self.live.read().clone()
    }

    /// Sorted list of live names, for display surfaces.
    pub fn live_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.live.read().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_report_edges_only() {
        let tracker = LiveStateTracker::new();
        assert!(tracker.mark_live("Alice"));
        assert!(!tracker.mark_live("alice"));
        assert!(tracker.is_live("ALICE"));
        assert!(tracker.mark_offline("alice"));
        assert!(!tracker.mark_offline("alice"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn names_are_stored_lowercase() {
        let tracker = LiveStateTracker::with_live(["BoB", "alice"]);
        assert_eq!(tracker.live_names(), vec!["alice", "bob"]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let tracker = LiveStateTracker::with_live(["alice"]);
        let snapshot = tracker.snapshot();
        tracker.mark_offline("alice");
        assert!(snapshot.contains("alice"));
        assert!(!tracker.is_live("alice"));
    }
}
