//! Test fixtures for integration testing

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use lobby_bot::command::{CommandContext, CommandDispatcher, DispatcherSettings};
use lobby_bot::discord::MockNotifier;
use lobby_bot::lobby::{Lobby, LobbyManager, ManagerSettings};
use lobby_bot::types::{
    ChannelRef, GuildRef, MemberId, MessageRef, ReactionEvent, RosterMember, VoiceChannelInfo,
    VoiceStateChange,
};
use std::sync::Arc;

pub const ORIGIN: ChannelRef = ChannelRef(10);
pub const GUILD: GuildRef = GuildRef(1);

pub const CTX: CommandContext = CommandContext {
    channel: ORIGIN,
    guild: Some(GUILD),
};

/// Complete bot core wired to a recording notifier
pub struct TestSystem {
    pub manager: Arc<LobbyManager>,
    pub dispatcher: CommandDispatcher,
    pub notifier: Arc<MockNotifier>,
}

pub fn create_test_system() -> TestSystem {
    create_test_system_with(MockNotifier::new())
}

/// Test system whose guild reports the given voice channels
pub fn create_test_system_with_voice(channels: Vec<VoiceChannelInfo>) -> TestSystem {
    create_test_system_with(MockNotifier::new().with_voice_channels(channels))
}

fn create_test_system_with(notifier: MockNotifier) -> TestSystem {
    let notifier = Arc::new(notifier);
    let settings = ManagerSettings {
        idle_timeout: Duration::minutes(5),
        reaction_emotes: vec!["🎮".to_string()],
    };
    let manager = Arc::new(LobbyManager::new(notifier.clone(), settings).unwrap());
    let dispatcher = CommandDispatcher::new(
        manager.clone(),
        DispatcherSettings {
            prefix: "$".to_string(),
            roll_count: 3,
            roll_delay: std::time::Duration::ZERO,
        },
    );

    TestSystem {
        manager,
        dispatcher,
        notifier,
    }
}

/// Fixed reference instant for clock-driven tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}

pub fn member(id: u64, name: &str) -> RosterMember {
    RosterMember::new(MemberId(id), name)
}

pub fn reaction(message: MessageRef, member: RosterMember) -> ReactionEvent {
    ReactionEvent {
        message_id: message,
        channel_id: ORIGIN,
        member,
    }
}

pub fn join_voice(member: u64, channel: u64) -> VoiceStateChange {
    VoiceStateChange {
        member_id: MemberId(member),
        previous_channel: None,
        new_channel: Some(ChannelRef(channel)),
    }
}

pub fn leave_voice(member: u64, channel: u64) -> VoiceStateChange {
    VoiceStateChange {
        member_id: MemberId(member),
        previous_channel: Some(ChannelRef(channel)),
        new_channel: None,
    }
}

pub fn voice_channel(id: u64, name: &str, position: u16) -> VoiceChannelInfo {
    VoiceChannelInfo {
        id: ChannelRef(id),
        name: name.to_string(),
        position,
    }
}

/// Open a lobby in the origin channel with explicit clock values
pub async fn open_lobby_at(
    manager: &LobbyManager,
    game: &str,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Lobby {
    manager
        .open_lobby(game, start_time, "at 6:10 PM", ORIGIN, Some(GUILD), now)
        .await
        .unwrap()
}

/// The announcement message a lobby's reactions attach to
pub fn announcement_of(lobby: &Lobby) -> MessageRef {
    lobby.message().expect("lobby has an announcement")
}
