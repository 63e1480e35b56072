//! Scheduler heartbeats.
//!
//! Each background loop records a beat per tick; the health endpoint
//! reports how long ago each task last ran.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Task name used by the polling loop.
pub const TASK_POLL: &str = "poll";
/// Task name used by the hourly channel maintenance loop.
pub const TASK_MAINTENANCE: &str = "channel-maintenance";
/// Task name used by the birthday announcement loop.
pub const TASK_BIRTHDAYS: &str = "birthdays";

/// Last-tick timestamps for the background loops.
#[derive(Default)]
pub struct Heartbeats {
    beats: DashMap<&'static str, DateTime<Utc>>,
}

impl Heartbeats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tick for `task`.
    pub fn beat(&self, task: &'static str) {
        self.beats.insert(task, Utc::now());
    }

    /// Last beat per task, sorted by task name.
    pub fn snapshot(&self) -> Vec<(&'static str, DateTime<Utc>)> {
        let mut all: Vec<_> = self.beats.iter().map(|e| (*e.key(), *e.value())).collect();
        all.sort_by_key(|(task, _)| *task);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_the_latest_beat_per_task() {
        let beats = Heartbeats::new();
        assert!(beats.snapshot().is_empty());

        beats.beat(TASK_POLL);
        beats.beat(TASK_BIRTHDAYS);
        beats.beat(TASK_POLL);

        let snapshot = beats.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, TASK_BIRTHDAYS);
        assert_eq!(snapshot[1].0, TASK_POLL);
    }
}
