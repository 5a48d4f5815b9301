//! Shared type definitions
//!
//! Identities are opaque platform strings; names are display logins.

use serde::{Deserialize, Serialize};

/// Opaque platform user id
pub type UserId = String;

/// Inbound chat event as delivered by the chat transport
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatEvent {
    pub user_id: UserId,
    pub user_name: String,
    pub is_moderator: bool,
    pub is_privileged_viewer: bool,
    pub text: String,
}

impl ChatEvent {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            is_moderator: false,
            is_privileged_viewer: false,
            text: text.into(),
        }
    }

    pub fn as_moderator(mut self) -> Self {
        self.is_moderator = true;
        self
    }

    pub fn as_privileged(mut self) -> Self {
        self.is_privileged_viewer = true;
        self
    }
}

/// A participant in a two-player game. The id may be unknown when identity
/// resolution failed; the game still proceeds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub id: Option<UserId>,
}

impl Player {
    pub fn new(name: impl Into<String>, id: Option<UserId>) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// Strip the mention marker chat users put in front of names
pub fn normalize_username(raw: &str) -> &str {
    raw.trim().trim_start_matches('@')
}
