//! End-to-end chat flows through the router
//!
//! Every test builds a full service container on a temp data directory with
//! a recording sink, then drives it with chat events.

use async_trait::async_trait;
use chatplay::{
    common::traits::{
        ChannelCategories, DisconnectedPresenter, Moderator, RecordingSink, StaticCategories, StaticDirectory,
        StaticPrivileges,
    },
    errors::{BotResult, ExternalError},
    BotConfig, ChatEvent, ServiceBuilder, ServiceContainer,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const ALICE: &str = "1000";
const BOB: &str = "2000";
const BROADCASTER: &str = "1034744882";

fn config(dir: &TempDir) -> BotConfig {
    let mut config = BotConfig::testing(dir.path());
    config.console.directory.insert("alice".to_string(), ALICE.to_string());
    config.console.directory.insert("bob".to_string(), BOB.to_string());
    config.console.directory.insert("urxi_".to_string(), BROADCASTER.to_string());
    config
}

fn services(dir: &TempDir, sink: Arc<RecordingSink>) -> ServiceContainer {
    ServiceBuilder::new(config(dir))
        .with_sink(sink)
        .with_seed(7)
        .build()
        .expect("services should build")
}

fn alice(text: &str) -> ChatEvent {
    ChatEvent::new(ALICE, "alice", text)
}

fn bob(text: &str) -> ChatEvent {
    ChatEvent::new(BOB, "bob", text)
}

#[derive(Default)]
struct RecordingModerator {
    penalties: Mutex<Vec<(String, Duration)>>,
}

#[async_trait]
impl Moderator for RecordingModerator {
    async fn apply_penalty(&self, user_id: &str, duration: Duration, _reason: &str) -> BotResult<()> {
        self.penalties.lock().unwrap().push((user_id.to_string(), duration));
        Ok(())
    }
}

#[tokio::test]
async fn test_accepted_wager_moves_exactly_the_stake() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let services = services(&dir, sink.clone());
    let router = services.router();

    let sent = router.dispatch(&alice("!bet @bob 200")).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("alice challenges bob to a bet of 200 coins!"));

    let sent = router.dispatch(&bob("!accept")).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].ends_with("wins the bet and takes 200 coins!"));

    let ledger = services.ledger();
    let (a, b) = (ledger.balance(ALICE), ledger.balance(BOB));
    assert_eq!(a + b, 2000);
    assert!((a, b) == (800, 1200) || (a, b) == (1200, 800), "got {} / {}", a, b);

    // the wager was consumed
    let sent = router.dispatch(&bob("!accept")).await;
    assert_eq!(sent, vec!["bob, nobody has challenged you.".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_unaccepted_wager_expires_after_timeout() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let services = services(&dir, sink.clone());
    let router = services.router();

    router.dispatch(&alice("!bet bob 100")).await;
    sink.take();

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(sink.lines().is_empty());
    assert_eq!(services.escrow().pending_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        sink.take(),
        vec!["bob did not accept in time. The challenge from alice is cancelled.".to_string()]
    );

    let sent = router.dispatch(&bob("!accept")).await;
    assert_eq!(sent, vec!["bob, nobody has challenged you.".to_string()]);
    assert_eq!(services.ledger().balance(ALICE), 1000);
    assert_eq!(services.ledger().balance(BOB), 1000);
    assert_eq!(services.metrics().wagers_expired.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_accept_after_challenger_spent_stake() {
    let dir = TempDir::new().unwrap();
    let services = services(&dir, Arc::new(RecordingSink::new()));
    let router = services.router();

    router.dispatch(&alice("!bet bob 1000")).await;
    services.ledger().debit(ALICE, 1000).unwrap();

    let sent = router.dispatch(&bob("!accept")).await;
    assert!(
        sent == vec!["bob wins the bet! alice could only pay 0 of the 1000 coins.".to_string()]
            || sent == vec!["alice wins the bet and takes 1000 coins!".to_string()],
        "got {:?}",
        sent
    );
    assert_eq!(services.escrow().pending_count(), 0);
    assert_eq!(services.ledger().balance(ALICE) + services.ledger().balance(BOB), 1000);
}

#[tokio::test]
async fn test_wager_rejections_leave_state_untouched() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let services = services(&dir, sink.clone());
    let router = services.router();

    let sent = router.dispatch(&alice("!bet bob 5000")).await;
    assert_eq!(
        sent,
        vec!["alice, you don't have enough coins for that bet! You have 1000 coins.".to_string()]
    );
    assert_eq!(services.escrow().pending_count(), 0);

    // a separate challenger so the bet cooldown does not swallow the line
    let sent = router.dispatch(&bob("!bet nobody_here 10")).await;
    assert_eq!(sent, vec!["Could not find a user named nobody_here.".to_string()]);
    assert_eq!(services.escrow().pending_count(), 0);
    assert_eq!(services.ledger().balance(ALICE), 1000);
    assert_eq!(services.ledger().balance(BOB), 1000);
}

#[tokio::test]
async fn test_roulette_through_router_eliminates_one_player() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let moderator = Arc::new(RecordingModerator::default());
    let services = ServiceBuilder::new(config(&dir))
        .with_sink(sink.clone())
        .with_moderator(moderator.clone())
        .with_seed(11)
        .build()
        .unwrap();
    let router = services.router();

    let sent = router.dispatch(&alice("!russianroulette @bob")).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("alice loads one bullet"));

    services.scheduler().drain().await;

    let lines = sink.lines();
    let bangs: Vec<&String> = lines.iter().filter(|l| l.contains("BANG!")).collect();
    assert_eq!(bangs.len(), 1, "lines: {:?}", lines);
    assert!(lines.iter().any(|l| l.ends_with("is timed out.")));

    let penalties = moderator.penalties.lock().unwrap().clone();
    assert_eq!(penalties.len(), 1);
    assert!(penalties[0].0 == ALICE || penalties[0].0 == BOB);

    // the bullet position is recorded for the overlay
    let slot: u8 = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("bullet.json")).unwrap(),
    )
    .unwrap();
    assert!((1..=6).contains(&slot));
}

#[tokio::test]
async fn test_roulette_never_penalizes_broadcaster() {
    let dir = TempDir::new().unwrap();
    let moderator = Arc::new(RecordingModerator::default());
    let services = ServiceBuilder::new(config(&dir))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_moderator(moderator.clone())
        .build()
        .unwrap();
    let router = services.router();

    for _ in 0..10 {
        router.dispatch(&alice("!russianroulette urxi_")).await;
    }
    services.scheduler().drain().await;

    let penalties = moderator.penalties.lock().unwrap().clone();
    assert_eq!(penalties.len(), 10);
    assert!(penalties.iter().all(|(id, _)| id == ALICE));
}

#[tokio::test]
async fn test_giveaway_commands_are_moderated() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let services = services(&dir, sink);
    let router = services.router();
    let moderator = |text: &str| ChatEvent::new("9", "carol", text).as_moderator();

    assert_eq!(
        router.dispatch(&alice("!random")).await,
        vec!["Only moderators can use that.".to_string()]
    );
    assert_eq!(
        router.dispatch(&moderator("!random")).await,
        vec!["No entries in the giveaway yet.".to_string()]
    );

    assert_eq!(
        router.dispatch(&alice("!enter").as_privileged()).await,
        vec!["alice is subscribed and gets double luck!".to_string()]
    );
    assert_eq!(
        router.dispatch(&bob("!enter")).await,
        vec!["bob has entered the giveaway.".to_string()]
    );
    assert_eq!(
        router.dispatch(&bob("!enter")).await,
        vec!["bob, you are already on the list.".to_string()]
    );
    assert_eq!(services.entry_pool().len(), 3);

    assert_eq!(
        router.dispatch(&moderator("!check")).await,
        vec!["Users in list: alice, bob".to_string()]
    );

    let sent = router.dispatch(&moderator("!random")).await;
    assert!(
        sent[0] == "Congratulations alice! You are the chosen one!"
            || sent[0] == "Congratulations bob! You are the chosen one!"
    );

    assert_eq!(
        router.dispatch(&alice("!reset")).await,
        vec!["Only moderators can use that.".to_string()]
    );
    assert_eq!(
        router.dispatch(&moderator("!reset")).await,
        vec!["The giveaway has been reset.".to_string()]
    );
    assert!(services.entry_pool().is_empty());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let moderator = |text: &str| ChatEvent::new("9", "carol", text).as_moderator();

    {
        let services = services(&dir, Arc::new(RecordingSink::new()));
        let router = services.router();

        router.dispatch(&moderator("!coin alice 250")).await;
        router.dispatch(&bob("!enter")).await;
        router.dispatch(&alice("ns")).await;
        router.dispatch(&moderator("!addcom !discord Join us at discord.gg/example")).await;
    }

    let services = services(&dir, Arc::new(RecordingSink::new()));
    let router = services.router();

    assert_eq!(services.ledger().balance(ALICE), 250);
    assert_eq!(services.entry_pool().list(), vec!["bob".to_string()]);
    assert_eq!(
        router.dispatch(&bob("!DISCORD")).await,
        vec!["Join us at discord.gg/example".to_string()]
    );
    assert_eq!(
        router.dispatch(&bob("NS")).await,
        vec!["Sharp shots fired so far: 2".to_string()]
    );
    assert_eq!(
        router.dispatch(&bob("!listcom")).await,
        vec!["Available commands: !discord".to_string()]
    );
}

#[tokio::test]
async fn test_hit_cooldown_is_per_user_and_shared_by_alias() {
    let dir = TempDir::new().unwrap();
    let services = services(&dir, Arc::new(RecordingSink::new()));
    let router = services.router();

    assert_eq!(router.dispatch(&alice("!hit bob")).await.len(), 1);
    assert!(router.dispatch(&alice("!ต่อย bob")).await.is_empty());
    assert_eq!(router.dispatch(&bob("!hit alice")).await.len(), 1);
}

#[tokio::test]
async fn test_builder_overrides_replace_local_collaborators() {
    let dir = TempDir::new().unwrap();
    let mut directory = HashMap::new();
    directory.insert("dave".to_string(), "4000".to_string());

    let services = ServiceBuilder::new(config(&dir))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_identity(Arc::new(StaticDirectory::new(directory)))
        .with_privileges(Arc::new(StaticPrivileges::new(vec![BOB.to_string()])))
        .with_presenter(Arc::new(DisconnectedPresenter))
        .build()
        .unwrap();
    let router = services.router();
    let moderator = |text: &str| ChatEvent::new("9", "carol", text).as_moderator();

    assert_eq!(
        router.dispatch(&alice("!coin dave")).await,
        vec!["dave has 0 coins.".to_string()]
    );
    assert_eq!(
        router.dispatch(&alice("!coin bob")).await,
        vec!["Could not find a user named bob.".to_string()]
    );
    assert_eq!(
        router.dispatch(&bob("!enter")).await,
        vec!["bob is subscribed and gets double luck!".to_string()]
    );

    // the wheel prop fails to show but the draw still stands
    assert_eq!(
        router.dispatch(&moderator("!random")).await,
        vec!["Congratulations bob! You are the chosen one!".to_string()]
    );
    services.scheduler().drain().await;
}

struct UnreachableCategories;

#[async_trait]
impl ChannelCategories for UnreachableCategories {
    async fn find_category_id(&self, _name: &str) -> BotResult<Option<String>> {
        Err(ExternalError::RequestFailed {
            service: "categories".to_string(),
            message: "timed out".to_string(),
        }
        .into())
    }

    async fn set_category(&self, _category_id: &str) -> BotResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_game_command_switches_category() {
    let dir = TempDir::new().unwrap();
    let mut ids = HashMap::new();
    ids.insert("Just Chatting".to_string(), "509658".to_string());
    let services = ServiceBuilder::new(config(&dir))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_categories(Arc::new(StaticCategories::new(ids)))
        .build()
        .unwrap();
    let router = services.router();
    let moderator = |text: &str| ChatEvent::new("9", "carol", text).as_moderator();

    assert_eq!(
        router.dispatch(&alice("!game Just Chatting")).await,
        vec!["Only moderators can use that.".to_string()]
    );
    assert_eq!(
        router.dispatch(&moderator("!game Just Chatting")).await,
        vec!["Category changed to Just Chatting.".to_string()]
    );
    assert_eq!(
        router.dispatch(&moderator("!game chess")).await,
        vec!["Could not find a category named chess.".to_string()]
    );
    assert_eq!(
        router.dispatch(&moderator("!game")).await,
        vec!["Usage: !game <category>".to_string()]
    );

    let failing = ServiceBuilder::new(config(&dir))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_categories(Arc::new(UnreachableCategories))
        .build()
        .unwrap();
    assert_eq!(
        failing.router().dispatch(&moderator("!game Just Chatting")).await,
        vec!["Something went wrong, please try again!".to_string()]
    );
}
