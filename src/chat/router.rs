//! Command boundary: turns inbound chat events into engine calls and every
//! outcome, success or failure, into a chat line.

use crate::chat::stores::CustomCommands;
use crate::common::traits::ChatSink;
use crate::common::types::ChatEvent;
use crate::cooldown::CooldownLimiter;
use crate::errors::BotError;
use crate::games::wager::WagerError;
use crate::metrics::EngineMetrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// User-facing failures. The display text is what gets sent to chat.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Could not find a user named {0}.")]
    UnknownUser(String),

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("{0}")]
    NoPendingAction(String),

    #[error("Only moderators can use that.")]
    PermissionDenied,

    #[error("Something went wrong, please try again!")]
    Internal(#[from] BotError),
}

impl CommandError {
    pub fn usage(text: &str) -> Self {
        CommandError::InvalidArgument(format!("Usage: {}", text))
    }
}

impl From<WagerError> for CommandError {
    fn from(err: WagerError) -> Self {
        match err {
            WagerError::InvalidAmount(_) => {
                CommandError::InvalidArgument("The bet amount must be a positive number.".to_string())
            }
            WagerError::UnknownUser(name) => CommandError::UnknownUser(name),
            WagerError::ChallengerInsufficientFunds { name, balance, .. } => CommandError::InsufficientFunds(
                format!("{}, you don't have enough coins for that bet! You have {} coins.", name, balance),
            ),
            WagerError::OpponentInsufficientFunds { name, .. } => CommandError::InsufficientFunds(format!(
                "{} doesn't have enough coins to take this bet!",
                name
            )),
            WagerError::NoPendingWager => CommandError::NoPendingAction("Nobody has challenged you.".to_string()),
            WagerError::Internal(e) => CommandError::Internal(e),
        }
    }
}

/// What a handler wants said back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Silent,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }
}

/// A parsed prefix command
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub event: ChatEvent,
    /// Lower-cased command name without the prefix
    pub command: String,
    pub args: Vec<String>,
    /// Text after the command name, whitespace preserved
    pub rest: String,
}

impl CommandContext {
    pub fn parse(event: &ChatEvent, prefix: &str) -> Option<Self> {
        let body = event.text.trim().strip_prefix(prefix)?;
        let mut split = body.splitn(2, char::is_whitespace);
        let command = split.next().filter(|c| !c.is_empty())?.to_lowercase();
        let rest = split.next().unwrap_or("").trim().to_string();
        let args = rest.split_whitespace().map(str::to_string).collect();

        Some(Self {
            event: event.clone(),
            command,
            args,
            rest,
        })
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// A registered command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError>;

    /// Per-user rate limit; denied invocations are dropped silently
    fn cooldown(&self) -> Option<Duration> {
        None
    }

    fn moderator_only(&self) -> bool {
        false
    }
}

/// Reacts to plain messages that are not prefix commands
#[async_trait]
pub trait MessageResponder: Send + Sync {
    async fn respond(&self, event: &ChatEvent) -> Option<String>;
}

/// Handler plus the name it was registered under; aliases share it
#[derive(Clone)]
struct Registered {
    name: String,
    handler: Arc<dyn CommandHandler>,
}

pub struct CommandRouter {
    prefix: String,
    handlers: HashMap<String, Registered>,
    custom: Arc<CustomCommands>,
    responders: Vec<Arc<dyn MessageResponder>>,
    cooldowns: Arc<CooldownLimiter>,
    sink: Arc<dyn ChatSink>,
    metrics: Arc<EngineMetrics>,
}

impl CommandRouter {
    pub fn new(
        prefix: impl Into<String>,
        custom: Arc<CustomCommands>,
        cooldowns: Arc<CooldownLimiter>,
        sink: Arc<dyn ChatSink>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            handlers: HashMap::new(),
            custom,
            responders: Vec::new(),
            cooldowns,
            sink,
            metrics,
        }
    }

    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> &mut Self {
        let name = name.to_lowercase();
        self.handlers.insert(name.clone(), Registered { name, handler });
        self
    }

    /// Make `alias` invoke the handler registered under `name`
    pub fn alias(&mut self, alias: &str, name: &str) -> &mut Self {
        if let Some(registered) = self.handlers.get(&name.to_lowercase()).cloned() {
            self.handlers.insert(alias.to_lowercase(), registered);
        } else {
            tracing::warn!(alias, name, "Alias for unregistered command ignored");
        }
        self
    }

    pub fn add_responder(&mut self, responder: Arc<dyn MessageResponder>) -> &mut Self {
        self.responders.push(responder);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Route one chat event and return every line sent in reply
    pub async fn dispatch(&self, event: &ChatEvent) -> Vec<String> {
        tracing::info!(target: "chatplay::chat", "{}: {}", event.user_name, event.text);
        let mut sent = Vec::new();

        if let Some(response) = self.custom.lookup(&event.text) {
            self.sink.say(&response).await;
            sent.push(response);
        }

        for responder in &self.responders {
            if let Some(line) = responder.respond(event).await {
                self.sink.say(&line).await;
                sent.push(line);
            }
        }

        if let Some(ctx) = CommandContext::parse(event, &self.prefix) {
            if let Some(line) = self.run(&ctx).await {
                self.sink.say(&line).await;
                sent.push(line);
            }
        }

        sent
    }

    async fn run(&self, ctx: &CommandContext) -> Option<String> {
        let Some(Registered { name, handler }) = self.handlers.get(&ctx.command) else {
            tracing::debug!(command = %ctx.command, "Unknown command");
            return None;
        };

        if handler.moderator_only() && !ctx.event.is_moderator {
            EngineMetrics::incr(&self.metrics.commands_rejected);
            tracing::info!(command = %ctx.command, user = %ctx.event.user_name, "Moderator-only command refused");
            return Some(CommandError::PermissionDenied.to_string());
        }

        if let Some(interval) = handler.cooldown() {
            if !self.cooldowns.check(&ctx.event.user_id, name, interval) {
                tracing::debug!(command = %ctx.command, user_id = %ctx.event.user_id, "On cooldown");
                return None;
            }
        }

        match handler.handle(ctx).await {
            Ok(Reply::Text(text)) => {
                EngineMetrics::incr(&self.metrics.commands_handled);
                Some(text)
            }
            Ok(Reply::Silent) => {
                EngineMetrics::incr(&self.metrics.commands_handled);
                None
            }
            Err(err) => {
                EngineMetrics::incr(&self.metrics.commands_rejected);
                match &err {
                    CommandError::Internal(source) => {
                        tracing::error!(command = %ctx.command, error = %source, "Command failed");
                    }
                    other => {
                        tracing::debug!(command = %ctx.command, error = %other, "Command rejected");
                    }
                }
                Some(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::RecordingSink;
    use crate::errors::StorageError;
    use crate::storage::JsonStore;
    use tempfile::TempDir;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
            if ctx.rest.is_empty() {
                return Err(CommandError::usage("!echo <text>"));
            }
            Ok(Reply::text(ctx.rest.clone()))
        }

        fn cooldown(&self) -> Option<Duration> {
            Some(Duration::from_secs(10))
        }
    }

    struct ModOnly;

    #[async_trait]
    impl CommandHandler for ModOnly {
        async fn handle(&self, _ctx: &CommandContext) -> Result<Reply, CommandError> {
            Ok(Reply::text("done"))
        }

        fn moderator_only(&self) -> bool {
            true
        }
    }

    struct Broken;

    #[async_trait]
    impl CommandHandler for Broken {
        async fn handle(&self, _ctx: &CommandContext) -> Result<Reply, CommandError> {
            Err(BotError::from(StorageError::WriteFailed("disk full".to_string())).into())
        }
    }

    fn router(dir: &TempDir, sink: Arc<RecordingSink>) -> CommandRouter {
        let custom = Arc::new(CustomCommands::open(JsonStore::new(dir.path().join("commands.json"))));
        custom.add("!discord", "discord.gg/abc").unwrap();

        let mut router = CommandRouter::new(
            "!",
            custom,
            Arc::new(CooldownLimiter::new()),
            sink,
            Arc::new(EngineMetrics::new()),
        );
        router
            .register("echo", Arc::new(Echo))
            .register("wipe", Arc::new(ModOnly))
            .register("broken", Arc::new(Broken))
            .alias("say", "echo");
        router
    }

    #[test]
    fn test_parse_command() {
        let event = ChatEvent::new("1", "alice", "!Bet  @bob   200");
        let ctx = CommandContext::parse(&event, "!").unwrap();
        assert_eq!(ctx.command, "bet");
        assert_eq!(ctx.args, vec!["@bob", "200"]);
        assert_eq!(ctx.arg(1), Some("200"));

        assert!(CommandContext::parse(&ChatEvent::new("1", "a", "hello"), "!").is_none());
        assert!(CommandContext::parse(&ChatEvent::new("1", "a", "!"), "!").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_reply_and_silent_cooldown() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let router = router(&dir, sink.clone());

        let event = ChatEvent::new("1", "alice", "!echo hi there");
        assert_eq!(router.dispatch(&event).await, vec!["hi there"]);
        assert!(router.dispatch(&event).await.is_empty());

        // an alias shares the cooldown of its command
        assert!(router.dispatch(&ChatEvent::new("1", "alice", "!say yo")).await.is_empty());
        assert_eq!(router.dispatch(&ChatEvent::new("2", "bob", "!say yo")).await, vec!["yo"]);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(router.dispatch(&event).await, vec!["hi there"]);
        assert_eq!(sink.lines().len(), 3);
    }

    #[tokio::test]
    async fn test_errors_become_chat_lines() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, Arc::new(RecordingSink::new()));

        assert_eq!(
            router.dispatch(&ChatEvent::new("1", "alice", "!echo")).await,
            vec!["Usage: !echo <text>"]
        );
        assert_eq!(
            router.dispatch(&ChatEvent::new("2", "bob", "!wipe")).await,
            vec!["Only moderators can use that."]
        );
        assert_eq!(
            router.dispatch(&ChatEvent::new("2", "bob", "!wipe").as_moderator()).await,
            vec!["done"]
        );
        assert_eq!(
            router.dispatch(&ChatEvent::new("2", "bob", "!broken")).await,
            vec!["Something went wrong, please try again!"]
        );
        assert!(router.dispatch(&ChatEvent::new("2", "bob", "!nope")).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_response_matches_whole_message() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, Arc::new(RecordingSink::new()));

        assert_eq!(
            router.dispatch(&ChatEvent::new("1", "alice", "!DISCORD")).await,
            vec!["discord.gg/abc"]
        );
        assert!(router.dispatch(&ChatEvent::new("1", "alice", "where is the !discord")).await.is_empty());
    }
}
