//! Chatplay - game and economy engine for a live-stream chat bot
//!
//! Viewer balances, 1v1 coin-flip wagers with a timed acceptance window, a
//! turn-based elimination mini-game, weighted giveaway draws and a handful
//! of chat utilities. Everything platform-facing sits behind the traits in
//! [`common::traits`].

pub mod chat;
pub mod common;
pub mod config;
pub mod cooldown;
pub mod errors;
pub mod games;
pub mod giveaway;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod services;
pub mod storage;

pub use chat::{CommandRouter, ConsoleTransport};
pub use common::types::{ChatEvent, Player, UserId};
pub use config::BotConfig;
pub use errors::{BotError, BotResult};
pub use games::{EliminationGame, WagerEscrow};
pub use giveaway::{EntryOutcome, EntryPool};
pub use ledger::Ledger;
pub use services::{Collaborators, ServiceBuilder, ServiceContainer};
