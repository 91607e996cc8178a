//! Common types used throughout the lobby bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for lobbies, assigned sequentially from 0
pub type LobbyId = u64;

macro_rules! snowflake_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake_ref!(
    /// A guild member (or the bot itself)
    MemberId
);
snowflake_ref!(
    /// A text or voice channel
    ChannelRef
);
snowflake_ref!(
    /// A posted message
    MessageRef
);
snowflake_ref!(
    /// A guild (community server)
    GuildRef
);

/// A member who signalled intent to join a lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub id: MemberId,
    pub display_name: String,
}

impl RosterMember {
    pub fn new(id: MemberId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// Platform mention markup that pings this member
    pub fn mention(&self) -> String {
        crate::utils::mention_member(self.id)
    }
}

/// Reaction added to or removed from a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message_id: MessageRef,
    pub channel_id: ChannelRef,
    pub member: RosterMember,
}

/// A member's voice channel changed (joined, left or moved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub member_id: MemberId,
    pub previous_channel: Option<ChannelRef>,
    pub new_channel: Option<ChannelRef>,
}

/// One field of the lobby listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingField {
    pub name: String,
    pub value: String,
}

/// A voice channel known to the guild, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChannelInfo {
    pub id: ChannelRef,
    pub name: String,
    pub position: u16,
}

/// Voice channel together with the number of members tracked in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChannelOccupancy {
    pub channel: VoiceChannelInfo,
    pub member_count: usize,
}

/// Why a lobby left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalReason {
    /// Explicit stop command
    Stopped,
    /// Idle-expiry sweep
    Idle,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::Stopped => "stopped",
            RemovalReason::Idle => "idle",
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a lobby removed by a sweep, returned for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedLobby {
    pub id: LobbyId,
    pub game: String,
    pub reason: RemovalReason,
    pub removed_at: DateTime<Utc>,
}
