//! Line-oriented console transport
//!
//! Each input line is one chat message, `name: text` or `name[mod]: text`.
//! Names are mapped to ids through the configured directory; unknown names
//! use the lower-cased name as their id.

use crate::chat::router::CommandRouter;
use crate::common::types::ChatEvent;
use crate::config::ConsoleConfig;
use crate::errors::BotResult;
use std::collections::{HashMap, HashSet};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub struct ConsoleTransport {
    directory: HashMap<String, String>,
    moderators: HashSet<String>,
    privileged: HashSet<String>,
}

impl ConsoleTransport {
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            directory: config
                .directory
                .iter()
                .map(|(name, id)| (name.to_lowercase(), id.clone()))
                .collect(),
            moderators: config.moderators.iter().map(|name| name.to_lowercase()).collect(),
            privileged: config.privileged_viewers.iter().cloned().collect(),
        }
    }

    pub fn parse_line(&self, line: &str) -> Option<ChatEvent> {
        let (speaker, text) = line.split_once(':')?;
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let speaker = speaker.trim();
        let (name, tagged_mod) = match speaker.strip_suffix("[mod]") {
            Some(name) => (name.trim(), true),
            None => (speaker, false),
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }

        let key = name.to_lowercase();
        let user_id = self.directory.get(&key).cloned().unwrap_or_else(|| key.clone());

        let mut event = ChatEvent::new(user_id.clone(), name, text);
        if tagged_mod || self.moderators.contains(&key) {
            event = event.as_moderator();
        }
        if self.privileged.contains(&user_id) {
            event = event.as_privileged();
        }
        Some(event)
    }

    /// Feed every line of `input` through `router` until EOF
    pub async fn run<R>(&self, input: R, router: &CommandRouter) -> BotResult<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut handled = 0;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_line(&line) {
                Some(event) => {
                    router.dispatch(&event).await;
                    handled += 1;
                }
                None => tracing::warn!(line = %line, "Expected `name: message` or `name[mod]: message`"),
            }
        }

        tracing::info!(handled, "Console input closed");
        Ok(handled)
    }
}
