//! Keyed deadline tracking for the event loop.
//!
//! Deadlines are explicit entries polled by the loop; nothing fires from
//! a callback. Cancelling a key drops its entry immediately, so no timer
//! for a torn-down neighbor or interface can fire afterwards.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

/// A set of keyed deadlines. Re-arming is the caller's job: a key taken
/// by [`TimerQueue::due`] stays gone until `set` again.
#[derive(Debug)]
pub struct TimerQueue<K> {
    deadlines: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Copy> TimerQueue<K> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }

    /// Arm or re-arm the deadline for a key.
    pub fn set(&mut self, key: K, deadline: Instant) {
        self.deadlines.insert(key, deadline);
    }

    /// Drop the deadline for a key, if armed.
    pub fn cancel(&mut self, key: K) {
        self.deadlines.remove(&key);
    }

    /// Remove and return every key whose deadline has passed.
    pub fn due(&mut self, now: Instant) -> Vec<K> {
        let fired: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, d)| **d <= now)
            .map(|(k, _)| *k)
            .collect();
        for key in &fired {
            self.deadlines.remove(key);
        }
        fired
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().copied().min()
    }

    /// True when nothing is armed.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl<K: Eq + Hash + Copy> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_due_removes_fired_keys() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        q.set("a", now + Duration::from_secs(1));
        q.set("b", now + Duration::from_secs(5));

        let fired = q.due(now + Duration::from_secs(2));
        assert_eq!(fired, vec!["a"]);
        // Fired keys stay gone until re-armed.
        assert!(q.due(now + Duration::from_secs(2)).is_empty());
        assert_eq!(q.next_deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        q.set("a", now + Duration::from_secs(1));
        q.cancel("a");
        assert!(q.due(now + Duration::from_secs(2)).is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        q.set("a", now + Duration::from_secs(1));
        q.set("a", now + Duration::from_secs(10));
        assert!(q.due(now + Duration::from_secs(5)).is_empty());
        assert_eq!(q.next_deadline(), Some(now + Duration::from_secs(10)));
    }
}
