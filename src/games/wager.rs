//! Two-party wager escrow with timed expiry

use crate::common::traits::{ChatSink, IdentityResolver};
use crate::common::types::normalize_username;
use crate::errors::BotError;
use crate::games::pending_pool::PendingWagersPool;
use crate::games::types::{Wager, WagerProposal, WagerSettlement, WagerSide};
use crate::ledger::Ledger;
use crate::metrics::EngineMetrics;
use crate::scheduler::TaskScheduler;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WagerError {
    #[error("Wager amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("{name} cannot cover {amount} (balance {balance})")]
    ChallengerInsufficientFunds { name: String, balance: u64, amount: u64 },

    #[error("{name} cannot cover {amount} (balance {balance})")]
    OpponentInsufficientFunds { name: String, balance: u64, amount: u64 },

    #[error("No pending wager")]
    NoPendingWager,

    #[error(transparent)]
    Internal(#[from] BotError),
}

/// Tunables for the escrow
#[derive(Debug, Clone, Copy)]
pub struct WagerSettings {
    /// Balance given to accounts first touched by a wager
    pub starting_balance: u64,
    /// How long a proposal waits for acceptance
    pub timeout: Duration,
}

/// Escrow for proposer/acceptor bets.
///
/// Per opponent id: NONE -> PROPOSED -> {ACCEPTED | EXPIRED} -> NONE.
/// Balances are validated at proposal time only; funds move on acceptance.
pub struct WagerEscrow {
    ledger: Arc<Ledger>,
    identity: Arc<dyn IdentityResolver>,
    sink: Arc<dyn ChatSink>,
    scheduler: TaskScheduler,
    metrics: Arc<EngineMetrics>,
    pool: PendingWagersPool,
    settings: WagerSettings,
    rng: Mutex<StdRng>,
}

impl WagerEscrow {
    pub fn new(
        ledger: Arc<Ledger>,
        identity: Arc<dyn IdentityResolver>,
        sink: Arc<dyn ChatSink>,
        scheduler: TaskScheduler,
        metrics: Arc<EngineMetrics>,
        settings: WagerSettings,
    ) -> Self {
        Self {
            ledger,
            identity,
            sink,
            scheduler,
            metrics,
            pool: PendingWagersPool::new(),
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the coin-flip source
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Validate and record a wager against `opponent_name`, then arm its
    /// expiry timer. A newer proposal against the same opponent silently
    /// replaces the older one.
    pub async fn propose(
        &self,
        challenger_id: &str,
        challenger_name: &str,
        opponent_name: &str,
        amount: i64,
    ) -> Result<WagerProposal, WagerError> {
        if amount <= 0 {
            return Err(WagerError::InvalidAmount(amount));
        }
        let amount = amount as u64;
        let opponent_name = normalize_username(opponent_name);

        let opponent_id = match self.identity.resolve_user_id(opponent_name).await {
            Ok(Some(id)) => id,
            Ok(None) => return Err(WagerError::UnknownUser(opponent_name.to_string())),
            Err(e) => {
                tracing::warn!(opponent = opponent_name, error = %e, "Identity lookup failed");
                return Err(WagerError::UnknownUser(opponent_name.to_string()));
            }
        };

        self.ledger.ensure(challenger_id, self.settings.starting_balance)?;
        self.ledger.ensure(&opponent_id, self.settings.starting_balance)?;

        let challenger_balance = self.ledger.balance(challenger_id);
        if amount > challenger_balance {
            return Err(WagerError::ChallengerInsufficientFunds {
                name: challenger_name.to_string(),
                balance: challenger_balance,
                amount,
            });
        }

        let opponent_balance = self.ledger.balance(&opponent_id);
        if amount > opponent_balance {
            return Err(WagerError::OpponentInsufficientFunds {
                name: opponent_name.to_string(),
                balance: opponent_balance,
                amount,
            });
        }

        let wager = Wager {
            challenger_id: challenger_id.to_string(),
            challenger_name: challenger_name.to_string(),
            opponent_id,
            opponent_name: opponent_name.to_string(),
            amount,
            created_at: Utc::now(),
        };

        let (generation, superseded) = self.pool.insert(wager.clone());
        EngineMetrics::incr(&self.metrics.wagers_proposed);
        if let Some(old) = &superseded {
            EngineMetrics::incr(&self.metrics.wagers_superseded);
            tracing::info!(
                opponent_id = %wager.opponent_id,
                previous_challenger = %old.challenger_name,
                "Pending wager superseded"
            );
        }

        tracing::info!(
            challenger_id,
            opponent_id = %wager.opponent_id,
            amount,
            generation,
            "Wager proposed"
        );

        self.schedule_expiry(wager.opponent_id.clone(), generation);

        Ok(WagerProposal {
            wager,
            generation,
            superseded,
        })
    }

    /// Settle the wager pending against `opponent_id` with a fair coin flip
    pub fn accept(&self, opponent_id: &str) -> Result<WagerSettlement, WagerError> {
        let wager = self.pool.take(opponent_id).ok_or(WagerError::NoPendingWager)?;

        let winner = if self.flip() {
            WagerSide::Challenger
        } else {
            WagerSide::Opponent
        };
        let (winner_id, loser_id) = match winner {
            WagerSide::Challenger => (&wager.challenger_id, &wager.opponent_id),
            WagerSide::Opponent => (&wager.opponent_id, &wager.challenger_id),
        };

        // balances were checked at proposal; a loser who has spent coins
        // since pays what is left instead of failing the acceptance
        let (paid, loser_balance, winner_balance) = self
            .ledger
            .transfer_up_to(loser_id, winner_id, wager.amount)
            .map_err(|e| {
                tracing::error!(opponent_id, amount = wager.amount, error = %e, "Wager settlement failed");
                e
            })?;

        EngineMetrics::incr(&self.metrics.wagers_accepted);
        tracing::info!(winner = %winner, winner_id = %winner_id, amount = wager.amount, paid, "Wager settled");

        Ok(WagerSettlement {
            wager,
            winner,
            paid,
            winner_balance,
            loser_balance,
        })
    }

    pub fn pending(&self, opponent_id: &str) -> Option<Wager> {
        self.pool.get(opponent_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pool.pending_count()
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    fn flip(&self) -> bool {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(0.5)
    }

    fn schedule_expiry(&self, opponent_id: String, generation: u64) {
        let pool = self.pool.clone();
        let sink = self.sink.clone();
        let metrics = self.metrics.clone();

        self.scheduler.schedule_after(self.settings.timeout, async move {
            match pool.expire(&opponent_id, generation) {
                Some(wager) => {
                    EngineMetrics::incr(&metrics.wagers_expired);
                    tracing::info!(opponent_id = %opponent_id, generation, "Wager expired");
                    sink.say(&format!(
                        "{} did not accept in time. The challenge from {} is cancelled.",
                        wager.opponent_name, wager.challenger_name
                    ))
                    .await;
                }
                None => {
                    tracing::debug!(opponent_id = %opponent_id, generation, "Stale expiry timer ignored");
                }
            }
        });
    }
}
