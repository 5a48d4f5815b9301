//! Virtual-currency ledger
//!
//! Maps user ids to non-negative balances. Every mutation is flushed to the
//! balance store before the call returns; if the flush fails the in-memory
//! change is rolled back so memory and disk never disagree.

use crate::common::types::UserId;
use crate::errors::{BotResult, LedgerError};
use crate::storage::JsonStore;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub type Balances = HashMap<UserId, u64>;

pub struct Ledger {
    accounts: Mutex<Balances>,
    store: JsonStore<Balances>,
}

impl Ledger {
    /// Load balances from `store`, starting empty if it is absent or corrupt
    pub fn open(store: JsonStore<Balances>) -> Self {
        let accounts = store.load_or_default();
        tracing::info!(accounts = accounts.len(), path = %store.path().display(), "Ledger loaded");
        Self {
            accounts: Mutex::new(accounts),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Balances> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Balance of `user_id`; 0 for accounts never seen
    pub fn balance(&self, user_id: &str) -> u64 {
        self.lock().get(user_id).copied().unwrap_or(0)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.lock().contains_key(user_id)
    }

    /// Create the account with `default_amount` unless it already exists.
    /// Returns whether the account was created.
    pub fn ensure(&self, user_id: &str, default_amount: u64) -> BotResult<bool> {
        let mut accounts = self.lock();
        if accounts.contains_key(user_id) {
            return Ok(false);
        }

        self.commit(&mut accounts, vec![(user_id.to_string(), default_amount)])?;
        tracing::debug!(user_id, default_amount, "Account created");
        Ok(true)
    }

    /// Add `amount` and return the new balance
    pub fn credit(&self, user_id: &str, amount: u64) -> BotResult<u64> {
        check_amount(amount)?;
        let mut accounts = self.lock();
        let current = accounts.get(user_id).copied().unwrap_or(0);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow { user_id: user_id.to_string() })?;

        self.commit(&mut accounts, vec![(user_id.to_string(), updated)])?;
        tracing::info!(user_id, amount, balance = updated, "Credited");
        Ok(updated)
    }

    /// Subtract `amount` and return the new balance. Never goes below zero.
    pub fn debit(&self, user_id: &str, amount: u64) -> BotResult<u64> {
        check_amount(amount)?;
        let mut accounts = self.lock();
        let current = accounts.get(user_id).copied().unwrap_or(0);
        let updated = current.checked_sub(amount).ok_or_else(|| LedgerError::InsufficientFunds {
            user_id: user_id.to_string(),
            balance: current,
            requested: amount,
        })?;

        self.commit(&mut accounts, vec![(user_id.to_string(), updated)])?;
        tracing::info!(user_id, amount, balance = updated, "Debited");
        Ok(updated)
    }

    /// Move `amount` from one account to another; both update or neither.
    /// Returns the new (from, to) balances.
    pub fn transfer(&self, from_id: &str, to_id: &str, amount: u64) -> BotResult<(u64, u64)> {
        check_amount(amount)?;
        let mut accounts = self.lock();

        if from_id == to_id {
            let balance = accounts.get(from_id).copied().unwrap_or(0);
            if balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    user_id: from_id.to_string(),
                    balance,
                    requested: amount,
                }
                .into());
            }
            return Ok((balance, balance));
        }

        let from_balance = accounts.get(from_id).copied().unwrap_or(0);
        let to_balance = accounts.get(to_id).copied().unwrap_or(0);

        let from_updated = from_balance.checked_sub(amount).ok_or_else(|| LedgerError::InsufficientFunds {
            user_id: from_id.to_string(),
            balance: from_balance,
            requested: amount,
        })?;
        let to_updated = to_balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow { user_id: to_id.to_string() })?;

        self.commit(
            &mut accounts,
            vec![(from_id.to_string(), from_updated), (to_id.to_string(), to_updated)],
        )?;
        tracing::info!(from_id, to_id, amount, "Transferred");
        Ok((from_updated, to_updated))
    }

    /// Move up to `max_amount` from one account to another, limited by what
    /// `from_id` holds. Returns (paid, from balance, to balance); nothing is
    /// written when `from_id` is empty.
    pub fn transfer_up_to(&self, from_id: &str, to_id: &str, max_amount: u64) -> BotResult<(u64, u64, u64)> {
        check_amount(max_amount)?;
        let mut accounts = self.lock();

        let from_balance = accounts.get(from_id).copied().unwrap_or(0);
        let paid = from_balance.min(max_amount);
        if paid == 0 || from_id == to_id {
            let to_balance = accounts.get(to_id).copied().unwrap_or(0);
            return Ok((paid, from_balance, to_balance));
        }

        let to_balance = accounts.get(to_id).copied().unwrap_or(0);
        let to_updated = to_balance
            .checked_add(paid)
            .ok_or_else(|| LedgerError::Overflow { user_id: to_id.to_string() })?;
        let from_updated = from_balance - paid;

        self.commit(
            &mut accounts,
            vec![(from_id.to_string(), from_updated), (to_id.to_string(), to_updated)],
        )?;
        if paid < max_amount {
            tracing::warn!(from_id, to_id, requested = max_amount, paid, "Transfer clamped to available balance");
        } else {
            tracing::info!(from_id, to_id, amount = paid, "Transferred");
        }
        Ok((paid, from_updated, to_updated))
    }

    pub fn snapshot(&self) -> Balances {
        self.lock().clone()
    }

    /// Apply `changes`, flush, and restore the previous values if the flush fails
    fn commit(&self, accounts: &mut Balances, changes: Vec<(UserId, u64)>) -> BotResult<()> {
        let previous: Vec<(UserId, Option<u64>)> = changes
            .iter()
            .map(|(id, _)| (id.clone(), accounts.get(id).copied()))
            .collect();

        for (id, balance) in changes {
            accounts.insert(id, balance);
        }

        if let Err(e) = self.store.save(accounts) {
            tracing::error!(error = %e, "Balance flush failed, rolling back");
            for (id, old) in previous {
                match old {
                    Some(balance) => accounts.insert(id, balance),
                    None => accounts.remove(&id),
                };
            }
            return Err(e);
        }

        Ok(())
    }
}

fn check_amount(amount: u64) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}
