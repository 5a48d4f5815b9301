//! Built-in chat commands

use crate::chat::router::{CommandContext, CommandError, CommandHandler, MessageResponder, Reply};
use crate::chat::stores::{CounterStore, CustomCommands, Menu};
use crate::common::traits::{ChannelCategories, IdentityResolver, PrivilegeChecker, PropPresenter};
use crate::common::types::{normalize_username, ChatEvent};
use crate::cooldown::CooldownLimiter;
use crate::games::roulette::EliminationGame;
use crate::games::wager::{WagerError, WagerEscrow};
use crate::giveaway::{EntryOutcome, EntryPool};
use crate::ledger::Ledger;
use crate::metrics::EngineMetrics;
use crate::scheduler::TaskScheduler;
use crate::storage::JsonStore;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ---- economy ----

/// `!coin`, `!coin <name>`, and `!coin <name> <amount>` for moderators
pub struct CoinCommand {
    pub ledger: Arc<Ledger>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl CoinCommand {
    async fn resolve(&self, raw: &str) -> Result<(String, String), CommandError> {
        let name = normalize_username(raw).to_string();
        match self.identity.resolve_user_id(&name).await {
            Ok(Some(id)) => Ok((name, id)),
            Ok(None) => Err(CommandError::UnknownUser(name)),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Identity lookup failed");
                Err(CommandError::UnknownUser(name))
            }
        }
    }
}

#[async_trait]
impl CommandHandler for CoinCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        match ctx.args.as_slice() {
            [] => {
                let balance = self.ledger.balance(&ctx.event.user_id);
                Ok(Reply::text(format!("@{}, you have {} coins.", ctx.event.user_name, balance)))
            }
            [target] => {
                let (name, id) = self.resolve(target).await?;
                Ok(Reply::text(format!("{} has {} coins.", name, self.ledger.balance(&id))))
            }
            [target, amount] if ctx.event.is_moderator => {
                let amount: u64 = amount
                    .parse()
                    .ok()
                    .filter(|a| *a > 0)
                    .ok_or_else(|| CommandError::InvalidArgument("Amount must be a positive number.".to_string()))?;
                let (name, id) = self.resolve(target).await?;
                self.ledger.credit(&id, amount)?;
                Ok(Reply::text(format!("Added {} coins to {}.", amount, name)))
            }
            _ => Err(CommandError::usage("!coin [target] [amount]")),
        }
    }
}

/// `!bet <opponent> <amount>`
pub struct BetCommand {
    pub escrow: Arc<WagerEscrow>,
    pub cooldown: Duration,
}

#[async_trait]
impl CommandHandler for BetCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let usage = || CommandError::usage("!bet <opponent> <amount>");
        let opponent = ctx.arg(0).ok_or_else(usage)?;
        let amount: i64 = ctx.arg(1).and_then(|a| a.parse().ok()).ok_or_else(usage)?;

        let proposal = self
            .escrow
            .propose(&ctx.event.user_id, &ctx.event.user_name, opponent, amount)
            .await?;

        Ok(Reply::text(format!(
            "{} challenges {} to a bet of {} coins! Type !accept within {} seconds to take it.",
            proposal.wager.challenger_name,
            proposal.wager.opponent_name,
            proposal.wager.amount,
            self.escrow.timeout().as_secs()
        )))
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(self.cooldown)
    }
}

/// `!accept`
pub struct AcceptCommand {
    pub escrow: Arc<WagerEscrow>,
}

#[async_trait]
impl CommandHandler for AcceptCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let settlement = self.escrow.accept(&ctx.event.user_id).map_err(|e| match e {
            WagerError::NoPendingWager => {
                CommandError::NoPendingAction(format!("{}, nobody has challenged you.", ctx.event.user_name))
            }
            other => other.into(),
        })?;

        if settlement.is_short() {
            return Ok(Reply::text(format!(
                "{} wins the bet! {} could only pay {} of the {} coins.",
                settlement.winner_name(),
                settlement.loser_name(),
                settlement.paid,
                settlement.wager.amount
            )));
        }

        Ok(Reply::text(format!(
            "{} wins the bet and takes {} coins!",
            settlement.winner_name(),
            settlement.wager.amount
        )))
    }
}

// ---- games ----

/// `!russianroulette <target>`
pub struct RouletteCommand {
    pub game: Arc<EliminationGame>,
}

#[async_trait]
impl CommandHandler for RouletteCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let [target] = ctx.args.as_slice() else {
            return Err(CommandError::usage("!russianroulette <target>"));
        };

        // the turn loop keeps running after this handle is dropped
        let _game = self
            .game
            .start(&ctx.event.user_name, &ctx.event.user_id, target)
            .await?;

        Ok(Reply::text(format!(
            "{} loads one bullet and hands the revolver to {}. Let the game begin!",
            ctx.event.user_name,
            normalize_username(target)
        )))
    }
}

// ---- giveaway ----

/// `!enter`
pub struct EnterCommand {
    pub pool: Arc<EntryPool>,
    pub privileges: Arc<dyn PrivilegeChecker>,
    pub metrics: Arc<EngineMetrics>,
}

#[async_trait]
impl CommandHandler for EnterCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let name = &ctx.event.user_name;
        if self.pool.is_entered(name) {
            return Ok(Reply::text(format!("{}, you are already on the list.", name)));
        }

        let privileged = ctx.event.is_privileged_viewer
            || match self.privileges.is_privileged_viewer(&ctx.event.user_id).await {
                Ok(privileged) => privileged,
                Err(e) => {
                    tracing::warn!(user_id = %ctx.event.user_id, error = %e, "Privilege lookup failed, single entry");
                    false
                }
            };

        let outcome = self.pool.enter(name, privileged)?;
        if outcome != EntryOutcome::AlreadyEntered {
            EngineMetrics::incr(&self.metrics.giveaway_entries);
        }

        Ok(Reply::text(match outcome {
            EntryOutcome::AlreadyEntered => format!("{}, you are already on the list.", name),
            EntryOutcome::EnteredSingle => format!("{} has entered the giveaway.", name),
            EntryOutcome::EnteredDouble => format!("{} is subscribed and gets double luck!", name),
        }))
    }
}

/// `!random`: draw a winner
pub struct DrawCommand {
    pub pool: Arc<EntryPool>,
    pub winner_store: JsonStore<Option<String>>,
    pub presenter: Arc<dyn PropPresenter>,
    pub scheduler: TaskScheduler,
    pub metrics: Arc<EngineMetrics>,
    pub wheel_source: String,
    pub wheel_duration: Duration,
}

#[async_trait]
impl CommandHandler for DrawCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Reply, CommandError> {
        let Some(winner) = self.pool.draw() else {
            return Ok(Reply::text("No entries in the giveaway yet."));
        };

        self.winner_store.save(&Some(winner.clone()))?;
        EngineMetrics::incr(&self.metrics.giveaway_draws);
        tracing::info!(winner = %winner, "Giveaway winner drawn");

        let presenter = self.presenter.clone();
        let source = self.wheel_source.clone();
        let duration = self.wheel_duration;
        self.scheduler.spawn(async move {
            if let Err(e) = presenter.show_prop(&source, duration).await {
                tracing::warn!(source = %source, error = %e, "Prop toggle failed");
            }
        });

        Ok(Reply::text(format!("Congratulations {}! You are the chosen one!", winner)))
    }

    fn moderator_only(&self) -> bool {
        true
    }
}

/// `!reset`: clear the giveaway
pub struct ResetCommand {
    pub pool: Arc<EntryPool>,
}

#[async_trait]
impl CommandHandler for ResetCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Reply, CommandError> {
        self.pool.reset()?;
        Ok(Reply::text("The giveaway has been reset."))
    }

    fn moderator_only(&self) -> bool {
        true
    }
}

/// `!check`: list entrants
pub struct CheckCommand {
    pub pool: Arc<EntryPool>,
}

#[async_trait]
impl CommandHandler for CheckCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Reply, CommandError> {
        let names = self.pool.list();
        if names.is_empty() {
            return Ok(Reply::text("Nobody has entered yet."));
        }
        Ok(Reply::text(format!("Users in list: {}", names.join(", "))))
    }

    fn moderator_only(&self) -> bool {
        true
    }
}

// ---- custom commands ----

fn split_definition(ctx: &CommandContext, usage: &str) -> Result<(String, String), CommandError> {
    let mut parts = ctx.rest.splitn(2, char::is_whitespace);
    match (parts.next(), parts.next().map(str::trim)) {
        (Some(trigger), Some(response)) if !trigger.is_empty() && !response.is_empty() => {
            Ok((trigger.to_string(), response.to_string()))
        }
        _ => Err(CommandError::usage(usage)),
    }
}

pub struct AddCustomCommand {
    pub custom: Arc<CustomCommands>,
}

#[async_trait]
impl CommandHandler for AddCustomCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let (trigger, response) = split_definition(ctx, "!addcom <command> <response>")?;
        if !self.custom.add(&trigger, &response)? {
            return Ok(Reply::text(format!(
                "Command {} already exists. Use !editcom to change it.",
                trigger
            )));
        }
        Ok(Reply::text(format!("Command {} has been added.", trigger)))
    }

    fn moderator_only(&self) -> bool {
        true
    }
}

pub struct EditCustomCommand {
    pub custom: Arc<CustomCommands>,
}

#[async_trait]
impl CommandHandler for EditCustomCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let (trigger, response) = split_definition(ctx, "!editcom <command> <response>")?;
        self.custom.upsert(&trigger, &response)?;
        Ok(Reply::text(format!("Command {} has been updated.", trigger)))
    }

    fn moderator_only(&self) -> bool {
        true
    }
}

pub struct ListCustomCommands {
    pub custom: Arc<CustomCommands>,
}

#[async_trait]
impl CommandHandler for ListCustomCommands {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Reply, CommandError> {
        let triggers = self.custom.triggers();
        if triggers.is_empty() {
            return Ok(Reply::text("No custom commands yet."));
        }
        Ok(Reply::text(format!("Available commands: {}", triggers.join(", "))))
    }
}

// ---- utilities ----

/// `!time` at a fixed UTC offset
pub struct TimeCommand {
    pub offset: FixedOffset,
}

impl TimeCommand {
    pub fn with_offset_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// "June 3rd 2026, 09:15:02 PM GMT+0700"
pub fn format_clock(now: &DateTime<FixedOffset>) -> String {
    let day = now.day();
    format!(
        "{} {}{} {}",
        now.format("%B"),
        day,
        ordinal_suffix(day),
        now.format("%Y, %I:%M:%S %p GMT%z")
    )
}

#[async_trait]
impl CommandHandler for TimeCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Reply, CommandError> {
        let now = Utc::now().with_timezone(&self.offset);
        Ok(Reply::text(format!("The time is now {}.", format_clock(&now))))
    }
}

/// `!hit <target>`
pub struct HitCommand {
    pub cooldown: Duration,
    pub rng: Mutex<StdRng>,
}

impl HitCommand {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

#[async_trait]
impl CommandHandler for HitCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let [target] = ctx.args.as_slice() else {
            return Err(CommandError::usage("!hit @username"));
        };
        let hits = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(1..=100);
        Ok(Reply::text(format!("@{} hits {} {} times!", ctx.event.user_name, target, hits)))
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(self.cooldown)
    }
}

/// `!so @channel`
pub struct ShoutoutCommand;

#[async_trait]
impl CommandHandler for ShoutoutCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let Some(target) = ctx.arg(0).map(normalize_username).filter(|t| !t.is_empty()) else {
            return Err(CommandError::InvalidArgument(format!(
                "{}, you forgot to tag the channel.",
                ctx.event.user_name
            )));
        };
        Ok(Reply::text(format!("Go follow this lovely person at twitch.tv/{}", target)))
    }

    fn moderator_only(&self) -> bool {
        true
    }
}

/// `!game <category name>`: switch the stream category
pub struct GameCategoryCommand {
    pub categories: Arc<dyn ChannelCategories>,
}

#[async_trait]
impl CommandHandler for GameCategoryCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        if ctx.rest.is_empty() {
            return Err(CommandError::usage("!game <category>"));
        }
        let name = ctx.rest.as_str();

        let Some(category_id) = self.categories.find_category_id(name).await? else {
            return Err(CommandError::InvalidArgument(format!("Could not find a category named {}.", name)));
        };
        self.categories.set_category(&category_id).await?;

        tracing::info!(category = %name, category_id = %category_id, "Stream category changed");
        Ok(Reply::text(format!("Category changed to {}.", name)))
    }

    fn moderator_only(&self) -> bool {
        true
    }
}

/// `!food`: suggest something to eat
pub struct FoodCommand {
    pub menu: Menu,
    pub rng: Mutex<StdRng>,
}

impl FoodCommand {
    pub fn new(menu: Menu) -> Self {
        Self {
            menu,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

#[async_trait]
impl CommandHandler for FoodCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Reply, CommandError> {
        let dish = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.menu.pick(&mut *rng)
        };
        match dish {
            Some(dish) => Ok(Reply::text(format!("{}, how about {} today?", ctx.event.user_name, dish))),
            None => Ok(Reply::text("The menu is empty, add some dishes first!")),
        }
    }
}

// ---- keyword counters ----

/// How a keyword trigger is compared with the lower-cased message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMatch {
    Exact,
    Prefix,
}

#[derive(Debug, Clone)]
struct KeywordTrigger {
    pattern: String,
    counter: String,
    kind: TriggerMatch,
}

impl KeywordTrigger {
    fn matches(&self, text: &str) -> bool {
        match self.kind {
            TriggerMatch::Exact => text == self.pattern,
            TriggerMatch::Prefix => text.starts_with(self.pattern.as_str()),
        }
    }
}

/// Counts chat messages that equal or start with configured triggers, plus
/// the `noob` taunt. Each keyword has its own per-user cooldown.
pub struct KeywordCounters {
    /// exact triggers first, then prefixes longest first
    triggers: Vec<KeywordTrigger>,
    counters: Arc<CounterStore>,
    cooldowns: Arc<CooldownLimiter>,
    interval: Duration,
}

impl KeywordCounters {
    pub const TAUNT_KEYWORD: &'static str = "noob";

    pub fn new(
        prefix_triggers: impl IntoIterator<Item = (String, String)>,
        exact_triggers: impl IntoIterator<Item = (String, String)>,
        counters: Arc<CounterStore>,
        cooldowns: Arc<CooldownLimiter>,
        interval: Duration,
    ) -> Self {
        let tagged = exact_triggers
            .into_iter()
            .map(|t| (t, TriggerMatch::Exact))
            .chain(prefix_triggers.into_iter().map(|t| (t, TriggerMatch::Prefix)));

        let mut triggers: Vec<KeywordTrigger> = tagged
            .map(|((pattern, counter), kind)| KeywordTrigger {
                pattern: pattern.trim().to_lowercase(),
                counter,
                kind,
            })
            .filter(|t| !t.pattern.is_empty())
            .collect();
        triggers.sort_by(|a, b| {
            (a.kind == TriggerMatch::Prefix)
                .cmp(&(b.kind == TriggerMatch::Prefix))
                .then_with(|| b.pattern.len().cmp(&a.pattern.len()))
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        Self {
            triggers,
            counters,
            cooldowns,
            interval,
        }
    }

    fn announce(counter: &str, total: u64) -> String {
        match counter {
            "sharp" => format!("Sharp shots fired so far: {}", total),
            "cute" => format!("Cuteness counted so far: {}", total),
            other => format!("{} count: {}", other, total),
        }
    }
}

#[async_trait]
impl MessageResponder for KeywordCounters {
    async fn respond(&self, event: &ChatEvent) -> Option<String> {
        let text = event.text.trim().to_lowercase();

        if text == Self::TAUNT_KEYWORD {
            if !self.cooldowns.check(&event.user_id, Self::TAUNT_KEYWORD, self.interval) {
                return None;
            }
            return Some("Takes one to know one!".to_string());
        }

        let counter = &self.triggers.iter().find(|t| t.matches(&text))?.counter;
        if !self.cooldowns.check(&event.user_id, counter, self.interval) {
            tracing::debug!(counter = %counter, user_id = %event.user_id, "Keyword on cooldown");
            return None;
        }

        match self.counters.increment(counter) {
            Ok(total) => Some(Self::announce(counter, total)),
            Err(e) => {
                tracing::error!(counter = %counter, error = %e, "Counter update failed");
                None
            }
        }
    }
}
