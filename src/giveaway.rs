//! Weighted giveaway entry pool

use crate::errors::BotResult;
use crate::storage::JsonStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of an `enter` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryOutcome {
    AlreadyEntered,
    EnteredSingle,
    EnteredDouble,
}

/// Ordered multiset of participant names, one element per unit of draw
/// weight. A participant's entries are appended under one lock and flushed
/// together, so the pool never holds a partially inserted participant.
pub struct EntryPool {
    entries: Mutex<Vec<String>>,
    store: JsonStore<Vec<String>>,
    privileged_weight: usize,
    rng: Mutex<StdRng>,
}

impl EntryPool {
    pub fn open(store: JsonStore<Vec<String>>, privileged_weight: usize) -> Self {
        Self::with_rng(store, privileged_weight, StdRng::from_entropy())
    }

    pub fn with_rng(store: JsonStore<Vec<String>>, privileged_weight: usize, rng: StdRng) -> Self {
        let entries = store.load_or_default();
        tracing::info!(entries = entries.len(), path = %store.path().display(), "Entry pool loaded");
        Self {
            entries: Mutex::new(entries),
            store,
            privileged_weight: privileged_weight.max(1),
            rng: Mutex::new(rng),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_entered(&self, name: &str) -> bool {
        self.lock().iter().any(|entry| entry == name)
    }

    pub fn enter(&self, name: &str, privileged: bool) -> BotResult<EntryOutcome> {
        let mut entries = self.lock();
        if entries.iter().any(|entry| entry == name) {
            return Ok(EntryOutcome::AlreadyEntered);
        }

        let weight = if privileged { self.privileged_weight } else { 1 };
        let before = entries.len();
        entries.extend(std::iter::repeat(name.to_string()).take(weight));

        if let Err(e) = self.store.save(&entries) {
            entries.truncate(before);
            return Err(e);
        }

        tracing::info!(name, weight, "Giveaway entry added");
        Ok(if privileged {
            EntryOutcome::EnteredDouble
        } else {
            EntryOutcome::EnteredSingle
        })
    }

    /// Uniform pick over all entries; `None` when the pool is empty.
    /// The winner stays in the pool.
    pub fn draw(&self) -> Option<String> {
        let entries = self.lock();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        entries.choose(&mut *rng).cloned()
    }

    pub fn reset(&self) -> BotResult<()> {
        let mut entries = self.lock();
        let previous = std::mem::take(&mut *entries);

        if let Err(e) = self.store.save(&entries) {
            *entries = previous;
            return Err(e);
        }

        tracing::info!(cleared = previous.len(), "Giveaway pool reset");
        Ok(())
    }

    /// Distinct participant names in entry order
    pub fn list(&self) -> Vec<String> {
        let entries = self.lock();
        let mut names: Vec<String> = Vec::new();
        for entry in entries.iter() {
            if !names.contains(entry) {
                names.push(entry.clone());
            }
        }
        names
    }

    pub fn entry_count(&self, name: &str) -> usize {
        self.lock().iter().filter(|entry| *entry == name).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_pool(dir: &TempDir) -> EntryPool {
        EntryPool::with_rng(
            JsonStore::new(dir.path().join("giveaway.json")),
            2,
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn test_enter_weights() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(&dir);

        assert_eq!(pool.enter("alice", true).unwrap(), EntryOutcome::EnteredDouble);
        assert_eq!(pool.enter("bob", false).unwrap(), EntryOutcome::EnteredSingle);
        assert_eq!(pool.entry_count("alice"), 2);
        assert_eq!(pool.entry_count("bob"), 1);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_second_entry_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(&dir);

        pool.enter("alice", false).unwrap();
        // upgrading to privileged later does not top up
        assert_eq!(pool.enter("alice", true).unwrap(), EntryOutcome::AlreadyEntered);
        assert_eq!(pool.entry_count("alice"), 1);
    }

    #[test]
    fn test_draw_empty_pool() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(&dir);
        assert_eq!(pool.draw(), None);
    }

    #[test]
    fn test_draw_is_weighted() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(&dir);
        pool.enter("alice", true).unwrap();
        pool.enter("bob", false).unwrap();

        let draws = 10_000;
        let alice_wins = (0..draws)
            .filter(|_| pool.draw().as_deref() == Some("alice"))
            .count();

        let ratio = alice_wins as f64 / draws as f64;
        assert!((0.62..0.71).contains(&ratio), "alice won {:.3} of draws", ratio);
        // draws never consume entries
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_list_reset_and_reload() {
        let dir = TempDir::new().unwrap();
        {
            let pool = open_pool(&dir);
            pool.enter("alice", true).unwrap();
            pool.enter("bob", false).unwrap();
            assert_eq!(pool.list(), vec!["alice", "bob"]);
        }

        let pool = open_pool(&dir);
        assert_eq!(pool.len(), 3);
        pool.reset().unwrap();
        assert!(pool.is_empty());

        let reopened = open_pool(&dir);
        assert!(reopened.is_empty());
    }
}
