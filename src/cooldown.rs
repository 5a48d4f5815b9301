//! Per-user, per-action rate gate

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Remembers the last permitted use of each (user, action) pair.
///
/// Denied calls leave the stored timestamp untouched, so a burst of denied
/// attempts does not extend the lock-out. Process-local, never persisted.
#[derive(Default)]
pub struct CooldownLimiter {
    last_use: DashMap<(String, String), Instant>,
}

impl CooldownLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, user_id: &str, action: &str, interval: Duration) -> bool {
        self.check_at(user_id, action, interval, Instant::now())
    }

    /// Gate against an explicit clock reading
    pub fn check_at(&self, user_id: &str, action: &str, interval: Duration, now: Instant) -> bool {
        // the entry holds the shard lock, serializing per key
        match self.last_use.entry((user_id.to_string(), action.to_string())) {
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
            Entry::Occupied(mut occupied) => {
                if now.saturating_duration_since(*occupied.get()) >= interval {
                    occupied.insert(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn tracked(&self) -> usize {
        self.last_use.len()
    }
}
