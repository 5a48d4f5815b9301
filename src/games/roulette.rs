//! Turn-based elimination game ("Russian roulette")
//!
//! `GameSession` is the pure state machine; `EliminationGame` drives it on a
//! background task with the pacing delays, chat messages, overlay prop and
//! the penalty on the loser.

use crate::common::traits::{ChatSink, IdentityResolver, Moderator, PropPresenter};
use crate::common::types::{normalize_username, Player};
use crate::config::BotConfig;
use crate::errors::BotResult;
use crate::games::types::{GameReport, PenaltyOutcome, TurnEvent};
use crate::metrics::EngineMetrics;
use crate::scheduler::TaskScheduler;
use crate::storage::JsonStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Chamber count must be at least 1")]
    NoChambers,

    #[error("Bullet slot {slot} outside 1..={chambers}")]
    SlotOutOfRange { slot: u8, chambers: u8 },
}

/// One game between two players.
///
/// Seat 0 is the target and seat 1 the initiator; shot `n` is taken by seat
/// `n % 2`, so the initiator pulls the trigger first. The slot is always in
/// `1..=chambers`, so the session is guaranteed to end by the last chamber.
#[derive(Debug, Clone)]
pub struct GameSession {
    seats: [Player; 2],
    bullet_slot: u8,
    chambers: u8,
    current_shot: u8,
    finished: bool,
}

impl GameSession {
    /// Draw the bullet slot uniformly from `1..=chambers`
    pub fn new<R: Rng + ?Sized>(
        initiator: Player,
        target: Player,
        chambers: u8,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        if chambers == 0 {
            return Err(SessionError::NoChambers);
        }
        let slot = rng.gen_range(1..=chambers);
        Self::with_slot(initiator, target, chambers, slot)
    }

    pub fn with_slot(initiator: Player, target: Player, chambers: u8, slot: u8) -> Result<Self, SessionError> {
        if chambers == 0 {
            return Err(SessionError::NoChambers);
        }
        if slot == 0 || slot > chambers {
            return Err(SessionError::SlotOutOfRange { slot, chambers });
        }
        Ok(Self {
            seats: [target, initiator],
            bullet_slot: slot,
            chambers,
            current_shot: 0,
            finished: false,
        })
    }

    pub fn bullet_slot(&self) -> u8 {
        self.bullet_slot
    }

    pub fn initiator(&self) -> &Player {
        &self.seats[1]
    }

    pub fn target(&self) -> &Player {
        &self.seats[0]
    }

    /// Player taking shot `shot`
    pub fn shooter(&self, shot: u8) -> &Player {
        &self.seats[(shot % 2) as usize]
    }

    /// The player not taking shot `shot`
    pub fn opposite(&self, shot: u8) -> &Player {
        &self.seats[((shot + 1) % 2) as usize]
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take the next shot. Returns `None` once the game is over.
    pub fn fire(&mut self) -> Option<TurnEvent> {
        if self.finished || self.current_shot >= self.chambers {
            return None;
        }
        self.current_shot += 1;
        let shot = self.current_shot;
        let eliminated = shot == self.bullet_slot;
        if eliminated {
            self.finished = true;
        }
        Some(TurnEvent {
            shot,
            player: self.shooter(shot).clone(),
            eliminated,
        })
    }
}

/// Who receives the penalty for `fatal_shot`.
/// The exempt identity is never penalized; its opponent takes the penalty
/// instead. Returns `(target, redirected)`, or `None` if both are exempt.
pub fn penalty_target<'a>(
    session: &'a GameSession,
    fatal_shot: u8,
    exempt_id: &str,
) -> Option<(&'a Player, bool)> {
    let loser = session.shooter(fatal_shot);
    let is_exempt = |p: &Player| p.id.as_deref() == Some(exempt_id);

    if !is_exempt(loser) {
        return Some((loser, false));
    }
    let other = session.opposite(fatal_shot);
    if is_exempt(other) {
        return None;
    }
    Some((other, true))
}

/// Game tunables taken from `BotConfig`
#[derive(Debug, Clone)]
pub struct RouletteSettings {
    pub chambers: u8,
    pub turn_delay: Duration,
    pub reveal_delay: Duration,
    pub penalty: Duration,
    pub prop_source: String,
    pub prop_duration: Duration,
    pub exempt_id: String,
    pub penalty_reason: String,
    pub redirected_penalty_reason: String,
}

impl RouletteSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            chambers: config.roulette.chambers,
            turn_delay: config.turn_delay(),
            reveal_delay: config.reveal_delay(),
            penalty: config.penalty_duration(),
            prop_source: config.roulette.prop_source.clone(),
            prop_duration: config.prop_duration(),
            exempt_id: config.channel.broadcaster_id.clone(),
            penalty_reason: config.roulette.penalty_reason.clone(),
            redirected_penalty_reason: config.roulette.redirected_penalty_reason.clone(),
        }
    }
}

/// Runs elimination games as independent background tasks
pub struct EliminationGame {
    identity: Arc<dyn IdentityResolver>,
    moderator: Arc<dyn Moderator>,
    presenter: Arc<dyn PropPresenter>,
    sink: Arc<dyn ChatSink>,
    scheduler: TaskScheduler,
    metrics: Arc<EngineMetrics>,
    slot_store: JsonStore<u8>,
    settings: Arc<RouletteSettings>,
    rng: Mutex<StdRng>,
}

impl EliminationGame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        moderator: Arc<dyn Moderator>,
        presenter: Arc<dyn PropPresenter>,
        sink: Arc<dyn ChatSink>,
        scheduler: TaskScheduler,
        metrics: Arc<EngineMetrics>,
        slot_store: JsonStore<u8>,
        settings: RouletteSettings,
    ) -> Self {
        Self {
            identity,
            moderator,
            presenter,
            sink,
            scheduler,
            metrics,
            slot_store,
            settings: Arc::new(settings),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Set up a game and start its turn sequence in the background.
    ///
    /// An unresolvable target still plays with an unknown id; penalties
    /// against that seat are skipped.
    pub async fn start(
        &self,
        initiator_name: &str,
        initiator_id: &str,
        target_name: &str,
    ) -> BotResult<JoinHandle<GameReport>> {
        let target_name = normalize_username(target_name);
        let target_id = match self.identity.resolve_user_id(target_name).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(target_name, error = %e, "Identity lookup failed, playing with unknown id");
                None
            }
        };
        if target_id.is_none() {
            tracing::warn!(target_name, "Target id unknown, penalty against them will be skipped");
        }

        let initiator = Player::new(initiator_name, Some(initiator_id.to_string()));
        let target = Player::new(target_name, target_id);

        let session = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            GameSession::new(initiator, target, self.settings.chambers, &mut *rng)
        }
        .map_err(|e| crate::errors::ConfigurationError::ValidationFailed(e.to_string()))?;

        self.slot_store.save(&session.bullet_slot())?;
        EngineMetrics::incr(&self.metrics.games_started);
        tracing::info!(
            initiator = initiator_name,
            target_name,
            slot = session.bullet_slot(),
            "Elimination game started"
        );

        let presenter = self.presenter.clone();
        let source = self.settings.prop_source.clone();
        let prop_duration = self.settings.prop_duration;
        self.scheduler.spawn(async move {
            if let Err(e) = presenter.show_prop(&source, prop_duration).await {
                tracing::warn!(source = %source, error = %e, "Prop toggle failed");
            }
        });

        let runner = TurnRunner {
            moderator: self.moderator.clone(),
            sink: self.sink.clone(),
            metrics: self.metrics.clone(),
            settings: self.settings.clone(),
        };
        Ok(self.scheduler.spawn(runner.run(session)))
    }
}

/// Everything the background turn loop needs
struct TurnRunner {
    moderator: Arc<dyn Moderator>,
    sink: Arc<dyn ChatSink>,
    metrics: Arc<EngineMetrics>,
    settings: Arc<RouletteSettings>,
}

impl TurnRunner {
    async fn run(self, mut session: GameSession) -> GameReport {
        let mut turns = Vec::new();

        loop {
            tokio::time::sleep(self.settings.turn_delay).await;

            // slot lies in 1..=chambers, so the fatal shot always arrives
            let Some(turn) = session.fire() else {
                unreachable!("session ended without a fatal shot");
            };
            turns.push(turn.clone());

            if !turn.eliminated {
                self.sink
                    .say(&format!("Shot {}: click! {} survives.", turn.shot, turn.player.name))
                    .await;
                continue;
            }

            self.sink
                .say(&format!(
                    "Shot {}: BANG! {} is out and will be timed out for {}s.",
                    turn.shot,
                    turn.player.name,
                    self.settings.penalty.as_secs()
                ))
                .await;
            tokio::time::sleep(self.settings.reveal_delay).await;

            let penalty = self.punish(&session, turn.shot).await;
            EngineMetrics::incr(&self.metrics.games_finished);

            return GameReport {
                initiator: session.initiator().clone(),
                target: session.target().clone(),
                bullet_slot: session.bullet_slot(),
                turns,
                loser: turn.player,
                penalty,
            };
        }
    }

    async fn punish(&self, session: &GameSession, fatal_shot: u8) -> PenaltyOutcome {
        let Some((target, redirected)) = penalty_target(session, fatal_shot, &self.settings.exempt_id) else {
            tracing::info!("Both players are exempt, no penalty");
            return PenaltyOutcome::Exempt;
        };

        let reason = if redirected {
            self.sink
                .say(&format!(
                    "But {} is untouchable and turns the gun on {} instead.",
                    session.shooter(fatal_shot).name,
                    target.name
                ))
                .await;
            &self.settings.redirected_penalty_reason
        } else {
            self.sink.say(&format!("{} is timed out.", target.name)).await;
            &self.settings.penalty_reason
        };

        let Some(user_id) = target.id.as_deref() else {
            tracing::warn!(player = %target.name, "Loser has no known id, penalty skipped");
            return PenaltyOutcome::Skipped { target: target.clone() };
        };

        match self.moderator.apply_penalty(user_id, self.settings.penalty, reason).await {
            Ok(()) => {
                EngineMetrics::incr(&self.metrics.penalties_applied);
                PenaltyOutcome::Applied {
                    target: target.clone(),
                    redirected,
                }
            }
            Err(e) => {
                EngineMetrics::incr(&self.metrics.penalties_failed);
                tracing::error!(user_id, error = %e, "Penalty could not be applied");
                PenaltyOutcome::Failed {
                    target: target.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}
