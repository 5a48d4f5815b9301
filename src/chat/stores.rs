//! Small persisted stores owned by the command layer

use crate::errors::BotResult;
use crate::storage::JsonStore;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Named running totals (`sharp`, `cute`, ...)
pub struct CounterStore {
    counters: Mutex<BTreeMap<String, u64>>,
    store: JsonStore<BTreeMap<String, u64>>,
}

impl CounterStore {
    pub fn open(store: JsonStore<BTreeMap<String, u64>>) -> Self {
        Self {
            counters: Mutex::new(store.load_or_default()),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, u64>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> u64 {
        self.lock().get(name).copied().unwrap_or(0)
    }

    /// Bump `name` by one and return the new total
    pub fn increment(&self, name: &str) -> BotResult<u64> {
        let mut counters = self.lock();
        let previous = counters.get(name).copied();
        let total = previous.unwrap_or(0).saturating_add(1);
        counters.insert(name.to_string(), total);

        if let Err(e) = self.store.save(&counters) {
            match previous {
                Some(value) => counters.insert(name.to_string(), value),
                None => counters.remove(name),
            };
            return Err(e);
        }
        Ok(total)
    }
}

/// Moderator-managed `trigger -> response` replies. Triggers are matched
/// against the whole lower-cased message.
pub struct CustomCommands {
    responses: Mutex<BTreeMap<String, String>>,
    store: JsonStore<BTreeMap<String, String>>,
}

impl CustomCommands {
    pub fn open(store: JsonStore<BTreeMap<String, String>>) -> Self {
        let responses: BTreeMap<String, String> = store
            .load_or_default()
            .into_iter()
            .map(|(trigger, response)| (trigger.to_lowercase(), response))
            .collect();
        Self {
            responses: Mutex::new(responses),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lookup(&self, text: &str) -> Option<String> {
        self.lock().get(&text.trim().to_lowercase()).cloned()
    }

    /// Add a new trigger. Returns `false` if it already exists.
    pub fn add(&self, trigger: &str, response: &str) -> BotResult<bool> {
        let trigger = trigger.to_lowercase();
        let mut responses = self.lock();
        if responses.contains_key(&trigger) {
            return Ok(false);
        }
        responses.insert(trigger.clone(), response.to_string());
        if let Err(e) = self.store.save(&responses) {
            responses.remove(&trigger);
            return Err(e);
        }
        tracing::info!(trigger = %trigger, response, "Custom command added");
        Ok(true)
    }

    /// Insert or replace a trigger
    pub fn upsert(&self, trigger: &str, response: &str) -> BotResult<()> {
        let trigger = trigger.to_lowercase();
        let mut responses = self.lock();
        let previous = responses.insert(trigger.clone(), response.to_string());
        if let Err(e) = self.store.save(&responses) {
            match previous {
                Some(old) => responses.insert(trigger, old),
                None => responses.remove(&trigger),
            };
            return Err(e);
        }
        tracing::info!(trigger = %trigger, response, "Custom command updated");
        Ok(())
    }

    pub fn triggers(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default)]
    pub name: Option<String>,
}

/// Read-only list of dishes, re-read on every pick so edits on disk apply
/// without a restart
pub struct Menu {
    store: JsonStore<Vec<MenuItem>>,
}

impl Menu {
    pub const UNNAMED: &'static str = "a mystery dish";

    pub fn new(store: JsonStore<Vec<MenuItem>>) -> Self {
        Self { store }
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let items = self.store.load_or_default();
        items.choose(rng).map(|item| {
            item.name
                .clone()
                .unwrap_or_else(|| Self::UNNAMED.to_string())
        })
    }
}
