//! Rendering sink for lobby output
//!
//! Everything the bot shows to users goes through [`LobbyNotifier`]. The
//! serenity implementation bounds every call with a timeout so a slow gateway
//! can never stall a sweep.

use crate::error::{LobbyError, Result};
use crate::types::{ChannelRef, GuildRef, ListingField, MemberId, MessageRef, VoiceChannelInfo};
use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, Colour, CreateEmbed, CreateMessage, EditMessage, GuildId, Http,
    MessageId, ReactionType, UserId,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Trait for rendering lobby output to the chat platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LobbyNotifier: Send + Sync {
    /// Post a text message and return its reference
    async fn send_message(&self, channel: ChannelRef, content: &str) -> Result<MessageRef>;

    /// Replace the text of a previously posted message
    async fn edit_message(
        &self,
        channel: ChannelRef,
        message: MessageRef,
        content: &str,
    ) -> Result<()>;

    /// Add a unicode reaction to a message
    async fn add_reaction(&self, channel: ChannelRef, message: MessageRef, emoji: &str)
        -> Result<()>;

    /// Post a structured listing (embed) with one field per entry
    async fn send_fields(
        &self,
        channel: ChannelRef,
        title: &str,
        fields: &[ListingField],
    ) -> Result<MessageRef>;

    /// Voice channels of a guild, sorted by display position
    async fn voice_channels(&self, guild: GuildRef) -> Result<Vec<VoiceChannelInfo>>;

    /// Move a member currently in voice to another voice channel
    async fn move_member(&self, guild: GuildRef, member: MemberId, channel: ChannelRef)
        -> Result<()>;
}

/// Serenity HTTP backed notifier
pub struct SerenityNotifier {
    http: Arc<Http>,
    request_timeout: Duration,
}

impl SerenityNotifier {
    pub fn new(http: Arc<Http>, request_timeout: Duration) -> Self {
        Self {
            http,
            request_timeout,
        }
    }

    /// Await a serenity call with the configured timeout
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = serenity::Result<T>> + Send,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("Discord call '{}' failed: {}", operation, e);
                Err(LobbyError::SinkFailed {
                    operation: operation.to_string(),
                    message: e.to_string(),
                }
                .into())
            }
            Err(_) => {
                warn!(
                    "Discord call '{}' timed out after {:?}",
                    operation, self.request_timeout
                );
                Err(LobbyError::SinkTimeout {
                    operation: operation.to_string(),
                    seconds: self.request_timeout.as_secs(),
                }
                .into())
            }
        }
    }
}

#[async_trait]
impl LobbyNotifier for SerenityNotifier {
    async fn send_message(&self, channel: ChannelRef, content: &str) -> Result<MessageRef> {
        let builder = CreateMessage::new().content(content);
        let message = self
            .bounded(
                "send_message",
                ChannelId::new(channel.get()).send_message(&self.http, builder),
            )
            .await?;
        debug!("Posted message {} to channel {}", message.id, channel);
        Ok(MessageRef(message.id.get()))
    }

    async fn edit_message(
        &self,
        channel: ChannelRef,
        message: MessageRef,
        content: &str,
    ) -> Result<()> {
        let builder = EditMessage::new().content(content);
        self.bounded(
            "edit_message",
            ChannelId::new(channel.get()).edit_message(
                &self.http,
                MessageId::new(message.get()),
                builder,
            ),
        )
        .await?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: ChannelRef,
        message: MessageRef,
        emoji: &str,
    ) -> Result<()> {
        self.bounded(
            "add_reaction",
            ChannelId::new(channel.get()).create_reaction(
                &self.http,
                MessageId::new(message.get()),
                ReactionType::Unicode(emoji.to_string()),
            ),
        )
        .await
    }

    async fn send_fields(
        &self,
        channel: ChannelRef,
        title: &str,
        fields: &[ListingField],
    ) -> Result<MessageRef> {
        let embed = CreateEmbed::new()
            .title(title)
            .colour(Colour::BLUE)
            .fields(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), f.value.clone(), false)),
            );
        let builder = CreateMessage::new().embed(embed);
        let message = self
            .bounded(
                "send_fields",
                ChannelId::new(channel.get()).send_message(&self.http, builder),
            )
            .await?;
        Ok(MessageRef(message.id.get()))
    }

    async fn voice_channels(&self, guild: GuildRef) -> Result<Vec<VoiceChannelInfo>> {
        let channels = self
            .bounded(
                "voice_channels",
                GuildId::new(guild.get()).channels(&self.http),
            )
            .await?;

        let mut voice: Vec<VoiceChannelInfo> = channels
            .into_values()
            .filter(|c| c.kind == ChannelType::Voice)
            .map(|c| VoiceChannelInfo {
                id: ChannelRef(c.id.get()),
                name: c.name,
                position: c.position,
            })
            .collect();
        voice.sort_by_key(|c| (c.position, c.id));
        Ok(voice)
    }

    async fn move_member(
        &self,
        guild: GuildRef,
        member: MemberId,
        channel: ChannelRef,
    ) -> Result<()> {
        self.bounded(
            "move_member",
            GuildId::new(guild.get()).move_member(
                &self.http,
                UserId::new(member.get()),
                ChannelId::new(channel.get()),
            ),
        )
        .await?;
        Ok(())
    }
}

/// One recorded call against [`MockNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Send {
        channel: ChannelRef,
        message: MessageRef,
        content: String,
    },
    Edit {
        channel: ChannelRef,
        message: MessageRef,
        content: String,
    },
    React {
        channel: ChannelRef,
        message: MessageRef,
        emoji: String,
    },
    Fields {
        channel: ChannelRef,
        title: String,
        fields: Vec<ListingField>,
    },
    Move {
        guild: GuildRef,
        member: MemberId,
        channel: ChannelRef,
    },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<SinkCall>,
    next_message: u64,
    failing: Vec<String>,
    voice_channels: Vec<VoiceChannelInfo>,
}

/// Recording notifier for testing
///
/// Every call is recorded; operations named in the failure list return a
/// `SinkFailed` error instead.
#[derive(Debug, Default)]
pub struct MockNotifier {
    state: Mutex<MockState>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Voice channels reported for every guild
    pub fn with_voice_channels(self, channels: Vec<VoiceChannelInfo>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.voice_channels = channels;
        }
        self
    }

    /// Make the named operation (`send_message`, `edit_message`, ...) fail
    pub fn fail(&self, operation: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing.push(operation.to_string());
        }
    }

    /// Let every operation succeed again
    pub fn recover(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failing.clear();
        }
    }

    /// Get all recorded calls (for testing)
    pub fn calls(&self) -> Vec<SinkCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// Contents of every posted text message, in order
    pub fn sent_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Send { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    /// Contents of every edit, in order
    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Edit { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded calls (for testing)
    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    fn record(&self, operation: &str, call: impl FnOnce(&mut MockState) -> SinkCall) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| LobbyError::lock_poisoned("mock notifier"))?;
        if state.failing.iter().any(|op| op == operation) {
            return Err(LobbyError::SinkFailed {
                operation: operation.to_string(),
                message: "injected failure".to_string(),
            }
            .into());
        }
        let entry = call(&mut state);
        state.calls.push(entry);
        Ok(())
    }

    fn next_message(state: &mut MockState) -> MessageRef {
        state.next_message += 1;
        MessageRef(1000 + state.next_message)
    }
}

#[async_trait]
impl LobbyNotifier for MockNotifier {
    async fn send_message(&self, channel: ChannelRef, content: &str) -> Result<MessageRef> {
        let mut posted = MessageRef(0);
        self.record("send_message", |state| {
            posted = Self::next_message(state);
            SinkCall::Send {
                channel,
                message: posted,
                content: content.to_string(),
            }
        })?;
        Ok(posted)
    }

    async fn edit_message(
        &self,
        channel: ChannelRef,
        message: MessageRef,
        content: &str,
    ) -> Result<()> {
        self.record("edit_message", |_| SinkCall::Edit {
            channel,
            message,
            content: content.to_string(),
        })
    }

    async fn add_reaction(
        &self,
        channel: ChannelRef,
        message: MessageRef,
        emoji: &str,
    ) -> Result<()> {
        self.record("add_reaction", |_| SinkCall::React {
            channel,
            message,
            emoji: emoji.to_string(),
        })
    }

    async fn send_fields(
        &self,
        channel: ChannelRef,
        title: &str,
        fields: &[ListingField],
    ) -> Result<MessageRef> {
        let mut posted = MessageRef(0);
        self.record("send_fields", |state| {
            posted = Self::next_message(state);
            SinkCall::Fields {
                channel,
                title: title.to_string(),
                fields: fields.to_vec(),
            }
        })?;
        Ok(posted)
    }

    async fn voice_channels(&self, _guild: GuildRef) -> Result<Vec<VoiceChannelInfo>> {
        let state = self
            .state
            .lock()
            .map_err(|_| LobbyError::lock_poisoned("mock notifier"))?;
        if state.failing.iter().any(|op| op == "voice_channels") {
            return Err(LobbyError::SinkFailed {
                operation: "voice_channels".to_string(),
                message: "injected failure".to_string(),
            }
            .into());
        }
        Ok(state.voice_channels.clone())
    }

    async fn move_member(
        &self,
        guild: GuildRef,
        member: MemberId,
        channel: ChannelRef,
    ) -> Result<()> {
        self.record("move_member", |_| SinkCall::Move {
            guild,
            member,
            channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let notifier = MockNotifier::new();

        let first = notifier.send_message(ChannelRef(1), "hello").await.unwrap();
        let second = notifier.send_message(ChannelRef(1), "again").await.unwrap();
        assert_ne!(first, second);

        notifier
            .edit_message(ChannelRef(1), first, "edited")
            .await
            .unwrap();

        assert_eq!(notifier.sent_messages(), vec!["hello", "again"]);
        assert_eq!(notifier.edits(), vec!["edited"]);
        assert_eq!(notifier.calls().len(), 3);

        notifier.clear_calls();
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mock_injected_failure() {
        let notifier = MockNotifier::new();
        notifier.fail("send_message");

        assert!(notifier.send_message(ChannelRef(1), "x").await.is_err());
        assert!(notifier.calls().is_empty());

        notifier.recover();
        assert!(notifier.send_message(ChannelRef(1), "x").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_voice_channels() {
        let notifier = MockNotifier::new().with_voice_channels(vec![VoiceChannelInfo {
            id: ChannelRef(5),
            name: "General".to_string(),
            position: 0,
        }]);
        let channels = notifier.voice_channels(GuildRef(1)).await.unwrap();
        assert_eq!(channels.len(), 1);
    }
}
