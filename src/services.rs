//! Service layer wiring the engine together
//!
//! `ServiceBuilder` takes a validated `BotConfig` plus optional collaborator
//! overrides and produces a `ServiceContainer` owning every engine object.
//! The container hands out a ready `CommandRouter`.

use crate::chat::handlers::{
    AcceptCommand, AddCustomCommand, BetCommand, CheckCommand, CoinCommand, DrawCommand, EditCustomCommand,
    EnterCommand, FoodCommand, GameCategoryCommand, HitCommand, KeywordCounters, ListCustomCommands, ResetCommand, RouletteCommand,
    ShoutoutCommand, TimeCommand,
};
use crate::chat::router::CommandRouter;
use crate::chat::stores::{CounterStore, CustomCommands, Menu};
use crate::common::traits::{
    ChannelCategories, ChatSink, IdentityResolver, LoggingModerator, LoggingPresenter, Moderator, PrivilegeChecker,
    PropPresenter, StaticCategories, StaticDirectory, StaticPrivileges, StdoutSink,
};
use crate::config::BotConfig;
use crate::cooldown::CooldownLimiter;
use crate::errors::{BotResult, ConfigurationError};
use crate::games::roulette::{EliminationGame, RouletteSettings};
use crate::games::wager::{WagerEscrow, WagerSettings};
use crate::giveaway::EntryPool;
use crate::ledger::Ledger;
use crate::metrics::EngineMetrics;
use crate::scheduler::TaskScheduler;
use crate::storage::JsonStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

/// Outside-world dependencies of the engine
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityResolver>,
    pub moderator: Arc<dyn Moderator>,
    pub presenter: Arc<dyn PropPresenter>,
    pub privileges: Arc<dyn PrivilegeChecker>,
    pub categories: Arc<dyn ChannelCategories>,
    pub sink: Arc<dyn ChatSink>,
}

impl Collaborators {
    /// Local stand-ins driven by the `[console]` config section
    pub fn local(config: &BotConfig) -> Self {
        Self {
            identity: Arc::new(StaticDirectory::new(config.console.directory.clone())),
            moderator: Arc::new(LoggingModerator),
            presenter: Arc::new(LoggingPresenter),
            privileges: Arc::new(StaticPrivileges::new(config.console.privileged_viewers.clone())),
            categories: Arc::new(StaticCategories::new(config.console.categories.clone())),
            sink: Arc::new(StdoutSink),
        }
    }
}

/// Owns every engine object for one channel
pub struct ServiceContainer {
    config: BotConfig,
    collaborators: Collaborators,
    scheduler: TaskScheduler,
    metrics: Arc<EngineMetrics>,
    cooldowns: Arc<CooldownLimiter>,
    ledger: Arc<Ledger>,
    pool: Arc<EntryPool>,
    escrow: Arc<WagerEscrow>,
    game: Arc<EliminationGame>,
    counters: Arc<CounterStore>,
    custom: Arc<CustomCommands>,
}

impl ServiceContainer {
    pub fn new(config: BotConfig, collaborators: Collaborators, seed: Option<u64>) -> BotResult<Self> {
        config
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))?;

        let storage = &config.storage;
        std::fs::create_dir_all(&storage.data_directory)?;

        let rng = |salt: u64| match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(salt)),
            None => StdRng::from_entropy(),
        };

        let scheduler = TaskScheduler::new();
        let metrics = Arc::new(EngineMetrics::new());
        let cooldowns = Arc::new(CooldownLimiter::new());

        let ledger = Arc::new(Ledger::open(JsonStore::new(storage.path_of(&storage.balances_file))));
        let pool = Arc::new(EntryPool::with_rng(
            JsonStore::new(storage.path_of(&storage.entries_file)),
            config.giveaway.privileged_weight,
            rng(1),
        ));
        let counters = Arc::new(CounterStore::open(JsonStore::new(storage.path_of(&storage.counters_file))));
        let custom = Arc::new(CustomCommands::open(JsonStore::new(storage.path_of(&storage.commands_file))));

        let escrow = Arc::new(
            WagerEscrow::new(
                ledger.clone(),
                collaborators.identity.clone(),
                collaborators.sink.clone(),
                scheduler.clone(),
                metrics.clone(),
                WagerSettings {
                    starting_balance: config.economy.starting_balance,
                    timeout: config.wager_timeout(),
                },
            )
            .with_rng(rng(2)),
        );

        let game = Arc::new(
            EliminationGame::new(
                collaborators.identity.clone(),
                collaborators.moderator.clone(),
                collaborators.presenter.clone(),
                collaborators.sink.clone(),
                scheduler.clone(),
                metrics.clone(),
                JsonStore::new(storage.path_of(&storage.bullet_file)),
                RouletteSettings::from_config(&config),
            )
            .with_rng(rng(3)),
        );

        tracing::info!(
            channel = %config.channel.channel_name,
            data_dir = %storage.data_directory.display(),
            "Services initialized"
        );

        Ok(Self {
            config,
            collaborators,
            scheduler,
            metrics,
            cooldowns,
            ledger,
            pool,
            escrow,
            game,
            counters,
            custom,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    pub fn entry_pool(&self) -> Arc<EntryPool> {
        Arc::clone(&self.pool)
    }

    pub fn escrow(&self) -> Arc<WagerEscrow> {
        Arc::clone(&self.escrow)
    }

    pub fn game(&self) -> Arc<EliminationGame> {
        Arc::clone(&self.game)
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn scheduler(&self) -> TaskScheduler {
        self.scheduler.clone()
    }

    /// Build the router with every built-in command registered
    pub fn router(&self) -> CommandRouter {
        let config = &self.config;
        let storage = &config.storage;
        let keyword_interval = Duration::from_secs(config.cooldowns.keyword_seconds);

        let mut router = CommandRouter::new(
            config.channel.command_prefix.clone(),
            self.custom.clone(),
            self.cooldowns.clone(),
            self.collaborators.sink.clone(),
            self.metrics.clone(),
        );

        router
            .register(
                "coin",
                Arc::new(CoinCommand {
                    ledger: self.ledger.clone(),
                    identity: self.collaborators.identity.clone(),
                }),
            )
            .register(
                "bet",
                Arc::new(BetCommand {
                    escrow: self.escrow.clone(),
                    cooldown: Duration::from_secs(config.economy.bet_cooldown_seconds),
                }),
            )
            .register("accept", Arc::new(AcceptCommand { escrow: self.escrow.clone() }))
            .register("russianroulette", Arc::new(RouletteCommand { game: self.game.clone() }))
            .register(
                "enter",
                Arc::new(EnterCommand {
                    pool: self.pool.clone(),
                    privileges: self.collaborators.privileges.clone(),
                    metrics: self.metrics.clone(),
                }),
            )
            .register(
                "random",
                Arc::new(DrawCommand {
                    pool: self.pool.clone(),
                    winner_store: JsonStore::new(storage.path_of(&storage.winner_file)),
                    presenter: self.collaborators.presenter.clone(),
                    scheduler: self.scheduler.clone(),
                    metrics: self.metrics.clone(),
                    wheel_source: config.giveaway.wheel_source.clone(),
                    wheel_duration: config.wheel_duration(),
                }),
            )
            .register("reset", Arc::new(ResetCommand { pool: self.pool.clone() }))
            .register("check", Arc::new(CheckCommand { pool: self.pool.clone() }))
            .register("addcom", Arc::new(AddCustomCommand { custom: self.custom.clone() }))
            .register("editcom", Arc::new(EditCustomCommand { custom: self.custom.clone() }))
            .register("listcom", Arc::new(ListCustomCommands { custom: self.custom.clone() }))
            .register("time", Arc::new(TimeCommand::with_offset_hours(config.channel.utc_offset_hours)))
            .register(
                "hit",
                Arc::new(HitCommand::new(Duration::from_secs(config.cooldowns.hit_seconds))),
            )
            .register("so", Arc::new(ShoutoutCommand))
            .register(
                "game",
                Arc::new(GameCategoryCommand {
                    categories: self.collaborators.categories.clone(),
                }),
            )
            .register(
                "food",
                Arc::new(FoodCommand::new(Menu::new(JsonStore::new(storage.path_of(&storage.menu_file))))),
            )
            // chat-native spellings
            .alias("ต่อย", "hit")
            .alias("กินไรดี", "food")
            .alias("สุ่ม", "enter");

        router.add_responder(Arc::new(KeywordCounters::new(
            config.cooldowns.counter_triggers.clone(),
            config.cooldowns.counter_exact_triggers.clone(),
            self.counters.clone(),
            self.cooldowns.clone(),
            keyword_interval,
        )));

        router
    }
}

/// Builder for service containers with collaborator overrides
pub struct ServiceBuilder {
    config: BotConfig,
    identity: Option<Arc<dyn IdentityResolver>>,
    moderator: Option<Arc<dyn Moderator>>,
    presenter: Option<Arc<dyn PropPresenter>>,
    privileges: Option<Arc<dyn PrivilegeChecker>>,
    categories: Option<Arc<dyn ChannelCategories>>,
    sink: Option<Arc<dyn ChatSink>>,
    seed: Option<u64>,
}

impl ServiceBuilder {
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            identity: None,
            moderator: None,
            presenter: None,
            privileges: None,
            categories: None,
            sink: None,
            seed: None,
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_moderator(mut self, moderator: Arc<dyn Moderator>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn PropPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn with_privileges(mut self, privileges: Arc<dyn PrivilegeChecker>) -> Self {
        self.privileges = Some(privileges);
        self
    }

    pub fn with_categories(mut self, categories: Arc<dyn ChannelCategories>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ChatSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Make every random draw reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> BotResult<ServiceContainer> {
        let local = Collaborators::local(&self.config);
        let collaborators = Collaborators {
            identity: self.identity.unwrap_or(local.identity),
            moderator: self.moderator.unwrap_or(local.moderator),
            presenter: self.presenter.unwrap_or(local.presenter),
            privileges: self.privileges.unwrap_or(local.privileges),
            categories: self.categories.unwrap_or(local.categories),
            sink: self.sink.unwrap_or(local.sink),
        };
        ServiceContainer::new(self.config, collaborators, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::RecordingSink;
    use crate::common::types::ChatEvent;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_router_has_every_command() {
        let dir = TempDir::new().unwrap();
        let services = ServiceBuilder::new(BotConfig::testing(dir.path()))
            .with_sink(Arc::new(RecordingSink::new()))
            .build()
            .unwrap();

        let commands = services.router().commands();
        for name in [
            "coin", "bet", "accept", "russianroulette", "enter", "random", "reset", "check", "addcom",
            "editcom", "listcom", "time", "hit", "so", "game", "food",
        ] {
            assert!(commands.iter().any(|c| c == name), "missing {}", name);
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = BotConfig::testing(dir.path());
        config.channel.broadcaster_id = String::new();

        assert!(ServiceBuilder::new(config).build().is_err());
    }

    #[tokio::test]
    async fn test_console_directory_feeds_identity() {
        let dir = TempDir::new().unwrap();
        let mut config = BotConfig::testing(dir.path());
        config.console.directory.insert("bob".to_string(), "2000".to_string());

        let services = ServiceBuilder::new(config)
            .with_sink(Arc::new(RecordingSink::new()))
            .build()
            .unwrap();
        services.ledger().ensure("2000", 1000).unwrap();

        let lines = services
            .router()
            .dispatch(&ChatEvent::new("1000", "alice", "!coin @bob"))
            .await;
        assert_eq!(lines, vec!["bob has 1000 coins."]);
    }
}
