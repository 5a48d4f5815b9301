pub mod pending_pool;
pub mod roulette;
pub mod types;
pub mod wager;

pub use pending_pool::PendingWagersPool;
pub use roulette::{EliminationGame, GameSession, RouletteSettings};
pub use types::*;
pub use wager::{WagerError, WagerEscrow, WagerSettings};
