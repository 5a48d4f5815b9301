use crate::common::types::UserId;
use crate::games::types::Wager;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pending wager stamped with the generation of its expiry timer
#[derive(Debug, Clone)]
pub struct PendingWager {
    pub wager: Wager,
    pub generation: u64,
}

/// Thread-safe pool of wagers waiting for the opponent, keyed by opponent id.
///
/// Each insert takes a fresh generation. The expiry timer only removes the
/// entry if the generation it was scheduled with is still the stored one, so
/// a wager that was accepted or superseded makes its timer a no-op.
#[derive(Clone)]
pub struct PendingWagersPool {
    pending: Arc<DashMap<UserId, PendingWager>>,
    next_generation: Arc<AtomicU64>,
}

impl PendingWagersPool {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Record `wager`, replacing any pending one for the same opponent.
    /// Returns the new generation and the displaced wager.
    pub fn insert(&self, wager: Wager) -> (u64, Option<Wager>) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let key = wager.opponent_id.clone();
        let previous = self.pending.insert(key, PendingWager { wager, generation });
        (generation, previous.map(|p| p.wager))
    }

    /// Remove and return the pending wager for `opponent_id`
    pub fn take(&self, opponent_id: &str) -> Option<Wager> {
        self.pending.remove(opponent_id).map(|(_, p)| p.wager)
    }

    /// Remove the wager only if it is still the one scheduled with `generation`
    pub fn expire(&self, opponent_id: &str, generation: u64) -> Option<Wager> {
        self.pending
            .remove_if(opponent_id, |_, p| p.generation == generation)
            .map(|(_, p)| p.wager)
    }

    pub fn get(&self, opponent_id: &str) -> Option<Wager> {
        self.pending.get(opponent_id).map(|p| p.wager.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, opponent_id: &str) -> bool {
        self.pending.contains_key(opponent_id)
    }
}

impl Default for PendingWagersPool {
    fn default() -> Self {
        Self::new()
    }
}
