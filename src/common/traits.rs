//! Collaborator interfaces consumed by the engine
//!
//! Everything that talks to the streaming platform or the overlay sits
//! behind these traits so the engine can be driven by mocks in tests and by
//! the console transport in the bundled binary.

use crate::common::types::UserId;
use crate::errors::{BotResult, ExternalError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Username -> user id lookup
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` when the platform has no such user
    async fn resolve_user_id(&self, username: &str) -> BotResult<Option<UserId>>;
}

/// Moderation actions against chat users
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn apply_penalty(&self, user_id: &str, duration: Duration, reason: &str) -> BotResult<()>;
}

/// Overlay/scene toggles
#[async_trait]
pub trait PropPresenter: Send + Sync {
    /// Show `source` and hide it again after `duration`
    async fn show_prop(&self, source: &str, duration: Duration) -> BotResult<()>;
}

/// Subscription/privilege lookup for giveaway weighting
#[async_trait]
pub trait PrivilegeChecker: Send + Sync {
    async fn is_privileged_viewer(&self, user_id: &str) -> BotResult<bool>;
}

/// Stream category lookup and update for the channel
#[async_trait]
pub trait ChannelCategories: Send + Sync {
    /// `Ok(None)` when no category has that name
    async fn find_category_id(&self, name: &str) -> BotResult<Option<String>>;
    async fn set_category(&self, category_id: &str) -> BotResult<()>;
}

/// Outbound messages to the originating channel
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, text: &str);

    /// Log the line under `chatplay::chat`, then send it
    async fn say(&self, text: &str) {
        tracing::info!(target: "chatplay::chat", "Bot: {}", text);
        self.send(text).await;
    }
}

/// Identity resolver backed by a fixed directory
pub struct StaticDirectory {
    users: HashMap<String, UserId>,
}

impl StaticDirectory {
    pub fn new(users: HashMap<String, UserId>) -> Self {
        let users = users
            .into_iter()
            .map(|(name, id)| (name.to_lowercase(), id))
            .collect();
        Self { users }
    }
}

#[async_trait]
impl IdentityResolver for StaticDirectory {
    async fn resolve_user_id(&self, username: &str) -> BotResult<Option<UserId>> {
        Ok(self.users.get(&username.to_lowercase()).cloned())
    }
}

/// Privilege checker backed by a fixed id list
pub struct StaticPrivileges {
    user_ids: Vec<UserId>,
}

impl StaticPrivileges {
    pub fn new(user_ids: Vec<UserId>) -> Self {
        Self { user_ids }
    }
}

#[async_trait]
impl PrivilegeChecker for StaticPrivileges {
    async fn is_privileged_viewer(&self, user_id: &str) -> BotResult<bool> {
        Ok(self.user_ids.iter().any(|id| id == user_id))
    }
}

/// Category directory backed by a fixed name -> id map; updates are logged
pub struct StaticCategories {
    ids: HashMap<String, String>,
}

impl StaticCategories {
    pub fn new(ids: HashMap<String, String>) -> Self {
        let ids = ids
            .into_iter()
            .map(|(name, id)| (name.to_lowercase(), id))
            .collect();
        Self { ids }
    }
}

#[async_trait]
impl ChannelCategories for StaticCategories {
    async fn find_category_id(&self, name: &str) -> BotResult<Option<String>> {
        Ok(self.ids.get(&name.trim().to_lowercase()).cloned())
    }

    async fn set_category(&self, category_id: &str) -> BotResult<()> {
        tracing::info!(category_id, "Channel category updated");
        Ok(())
    }
}

/// Moderator that only records the action in the log
pub struct LoggingModerator;

#[async_trait]
impl Moderator for LoggingModerator {
    async fn apply_penalty(&self, user_id: &str, duration: Duration, reason: &str) -> BotResult<()> {
        tracing::info!(user_id, duration_secs = duration.as_secs(), reason, "Penalty applied");
        Ok(())
    }
}

/// Presenter that only records the toggle in the log
pub struct LoggingPresenter;

#[async_trait]
impl PropPresenter for LoggingPresenter {
    async fn show_prop(&self, source: &str, duration: Duration) -> BotResult<()> {
        tracing::info!(source, duration_ms = duration.as_millis() as u64, "Prop shown");
        Ok(())
    }
}

/// Presenter used when no overlay is connected
pub struct DisconnectedPresenter;

#[async_trait]
impl PropPresenter for DisconnectedPresenter {
    async fn show_prop(&self, source: &str, _duration: Duration) -> BotResult<()> {
        Err(ExternalError::NotConnected(format!("overlay (source {})", source)).into())
    }
}

/// Sink that collects every outbound line, for tests and the console
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<String> {
        self.lines.lock().map(|mut l| std::mem::take(&mut *l)).unwrap_or_default()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}

/// Sink that writes every outbound line to stdout
pub struct StdoutSink;

#[async_trait]
impl ChatSink for StdoutSink {
    async fn send(&self, text: &str) {
        println!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_is_case_insensitive() {
        let mut users = HashMap::new();
        users.insert("Bob".to_string(), "2000".to_string());
        let directory = StaticDirectory::new(users);

        assert_eq!(directory.resolve_user_id("bob").await.unwrap(), Some("2000".to_string()));
        assert_eq!(directory.resolve_user_id("BOB").await.unwrap(), Some("2000".to_string()));
        assert_eq!(directory.resolve_user_id("carol").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_static_categories_lookup() {
        let mut ids = HashMap::new();
        ids.insert("Just Chatting".to_string(), "509658".to_string());
        let categories = StaticCategories::new(ids);

        assert_eq!(
            categories.find_category_id("just chatting").await.unwrap(),
            Some("509658".to_string())
        );
        assert_eq!(categories.find_category_id("chess").await.unwrap(), None);
        assert!(categories.set_category("509658").await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnected_presenter_fails() {
        let result = DisconnectedPresenter.show_prop("gun", Duration::from_secs(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recording_sink_take_drains() {
        let sink = RecordingSink::new();
        sink.send("one").await;
        sink.send("two").await;
        assert_eq!(sink.take(), vec!["one", "two"]);
        assert!(sink.lines().is_empty());
    }
}
