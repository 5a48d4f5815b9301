pub mod console;
pub mod handlers;
pub mod router;
pub mod stores;

pub use console::ConsoleTransport;
pub use router::{CommandContext, CommandError, CommandHandler, CommandRouter, MessageResponder, Reply};
