use crate::common::types::{Player, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A proposed two-party bet, keyed by the opponent while pending
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Wager {
    pub challenger_id: UserId,
    pub challenger_name: String,
    pub opponent_id: UserId,
    pub opponent_name: String,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
}

/// Which side of a wager won the coin flip
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WagerSide {
    Challenger,
    Opponent,
}

impl fmt::Display for WagerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerSide::Challenger => write!(f, "challenger"),
            WagerSide::Opponent => write!(f, "opponent"),
        }
    }
}

/// A freshly recorded wager and what it replaced
#[derive(Debug, Clone)]
pub struct WagerProposal {
    pub wager: Wager,
    /// Validity token for this wager's expiry timer
    pub generation: u64,
    /// Pending wager against the same opponent that this one displaced
    pub superseded: Option<Wager>,
}

/// Result of an accepted wager after funds moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WagerSettlement {
    pub wager: Wager,
    pub winner: WagerSide,
    /// Coins actually moved; below `wager.amount` when the loser spent part
    /// of the stake before acceptance
    pub paid: u64,
    pub winner_balance: u64,
    pub loser_balance: u64,
}

impl WagerSettlement {
    pub fn winner_name(&self) -> &str {
        match self.winner {
            WagerSide::Challenger => &self.wager.challenger_name,
            WagerSide::Opponent => &self.wager.opponent_name,
        }
    }

    pub fn loser_name(&self) -> &str {
        match self.winner {
            WagerSide::Challenger => &self.wager.opponent_name,
            WagerSide::Opponent => &self.wager.challenger_name,
        }
    }

    pub fn is_short(&self) -> bool {
        self.paid < self.wager.amount
    }

    pub fn winner_id(&self) -> &str {
        match self.winner {
            WagerSide::Challenger => &self.wager.challenger_id,
            WagerSide::Opponent => &self.wager.opponent_id,
        }
    }

    pub fn loser_id(&self) -> &str {
        match self.winner {
            WagerSide::Challenger => &self.wager.opponent_id,
            WagerSide::Opponent => &self.wager.challenger_id,
        }
    }
}

/// One pull of the trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnEvent {
    pub shot: u8,
    pub player: Player,
    pub eliminated: bool,
}

/// What happened to the loser's penalty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PenaltyOutcome {
    /// Penalty accepted by the moderation service
    Applied { target: Player, redirected: bool },
    /// Target id never resolved, nothing to penalize
    Skipped { target: Player },
    /// Both players are the exempt identity
    Exempt,
    /// Moderation service refused or errored
    Failed { target: Player, error: String },
}

impl PenaltyOutcome {
    pub fn target(&self) -> Option<&Player> {
        match self {
            PenaltyOutcome::Applied { target, .. }
            | PenaltyOutcome::Skipped { target }
            | PenaltyOutcome::Failed { target, .. } => Some(target),
            PenaltyOutcome::Exempt => None,
        }
    }

    /// Whether the moderation collaborator was called
    pub fn attempted(&self) -> bool {
        matches!(self, PenaltyOutcome::Applied { .. } | PenaltyOutcome::Failed { .. })
    }
}

/// Full record of one finished elimination game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameReport {
    pub initiator: Player,
    pub target: Player,
    pub bullet_slot: u8,
    pub turns: Vec<TurnEvent>,
    pub loser: Player,
    pub penalty: PenaltyOutcome,
}
