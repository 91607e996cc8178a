//! Integration tests for the lobby bot
//!
//! These tests drive the whole core together through the public API:
//! - Lobby lifecycle from announcement to idle expiry
//! - Command dispatch and replies
//! - Voice presence and `clearcomms`
//! - The background scheduler against a live clock

mod fixtures;

use fixtures::*;
use lobby_bot::discord::SinkCall;
use lobby_bot::lobby::{LobbyScheduler, LobbyState};
use lobby_bot::types::{ChannelRef, MemberId, RemovalReason};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_complete_lobby_lifecycle() {
    let system = create_test_system();
    let manager = &system.manager;

    // Step 1: announce a lobby ten minutes ahead
    let lobby = open_lobby_at(manager, "Halo", t0() + minutes(10), t0()).await;
    assert_eq!(lobby.id(), 0);
    assert_eq!(lobby.state(), LobbyState::Scheduled);
    let message = announcement_of(&lobby);

    // Step 2: two members react
    let at = t0() + minutes(1);
    assert!(manager
        .handle_reaction_add_at(&reaction(message, member(1, "Alice")), at)
        .await
        .unwrap());
    assert!(manager
        .handle_reaction_add_at(&reaction(message, member(2, "Bob")), at)
        .await
        .unwrap());
    assert_eq!(
        system.notifier.edits().last().unwrap(),
        "Halo lobby (ID: 0) starting at 6:10 PM! React to join!\n\nCurrent players: Alice, Bob"
    );

    // Step 3: nothing fires before the start time, then exactly once
    assert!(manager
        .run_activation_sweep_at(t0() + minutes(5))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        manager
            .run_activation_sweep_at(t0() + minutes(10))
            .await
            .unwrap(),
        vec![0]
    );
    assert!(manager
        .run_activation_sweep_at(t0() + minutes(11))
        .await
        .unwrap()
        .is_empty());

    let pings: Vec<String> = system
        .notifier
        .sent_messages()
        .into_iter()
        .filter(|m| m.starts_with("The Halo lobby"))
        .collect();
    assert_eq!(pings, vec!["The Halo lobby is starting now! <@1> <@2>"]);
    assert_eq!(
        manager.get_lobby(0).await.unwrap().unwrap().state(),
        LobbyState::Active
    );

    // Step 4: Alice plays for a while, then everyone leaves voice
    manager
        .handle_voice_state_at(&join_voice(1, 100), t0() + minutes(11))
        .await
        .unwrap();
    manager
        .handle_voice_state_at(&leave_voice(1, 100), t0() + minutes(20))
        .await
        .unwrap();

    // Step 5: the idle clock runs from the last departure
    assert!(manager
        .run_idle_sweep_at(t0() + minutes(24))
        .await
        .unwrap()
        .is_empty());
    let removed = manager
        .run_idle_sweep_at(t0() + minutes(25) + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, 0);
    assert_eq!(removed[0].reason, RemovalReason::Idle);
    assert_eq!(
        system.notifier.sent_messages().last().unwrap(),
        "Lobby 0 (Halo) closed after 5 minutes of voice inactivity."
    );
    assert!(manager.list_lobbies().await.unwrap().is_empty());

    let stats = manager.get_stats().await.unwrap();
    assert_eq!(stats.lobbies_created, 1);
    assert_eq!(stats.activations, 1);
    assert_eq!(stats.pings_sent, 1);
    assert_eq!(stats.roster_joins, 2);
    assert_eq!(stats.lobbies_expired, 1);
    assert_eq!(stats.active_lobbies, 0);
}

#[tokio::test]
async fn test_voice_presence_keeps_lobby_alive() {
    let system = create_test_system();
    let manager = &system.manager;

    manager
        .seed_presence(vec![(MemberId(1), ChannelRef(100))])
        .await
        .unwrap();
    let lobby = open_lobby_at(manager, "Doom", t0(), t0()).await;
    manager
        .handle_reaction_add_at(&reaction(announcement_of(&lobby), member(1, "Alice")), t0())
        .await
        .unwrap();

    // Hours later the lobby survives while Alice stays in voice
    assert!(manager
        .run_idle_sweep_at(t0() + minutes(240))
        .await
        .unwrap()
        .is_empty());

    // Moving between channels is not a departure
    manager
        .handle_voice_state_at(
            &lobby_bot::types::VoiceStateChange {
                member_id: MemberId(1),
                previous_channel: Some(ChannelRef(100)),
                new_channel: Some(ChannelRef(101)),
            },
            t0() + minutes(241),
        )
        .await
        .unwrap();
    assert!(manager
        .run_idle_sweep_at(t0() + minutes(300))
        .await
        .unwrap()
        .is_empty());

    manager
        .handle_voice_state_at(&leave_voice(1, 101), t0() + minutes(300))
        .await
        .unwrap();
    assert_eq!(
        manager
            .run_idle_sweep_at(t0() + minutes(306))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_leaving_roster_restarts_idle_clock() {
    let system = create_test_system();
    let manager = &system.manager;

    manager
        .seed_presence(vec![(MemberId(1), ChannelRef(100))])
        .await
        .unwrap();
    let lobby = open_lobby_at(manager, "Quake", t0(), t0()).await;
    let message = announcement_of(&lobby);
    manager
        .handle_reaction_add_at(&reaction(message, member(1, "Alice")), t0())
        .await
        .unwrap();

    // Alice withdraws while in voice: the roster just became all-absent
    assert!(manager
        .handle_reaction_remove_at(&reaction(message, member(1, "Alice")), t0() + minutes(30))
        .await
        .unwrap());
    assert_eq!(
        system.notifier.edits().last().unwrap(),
        "Quake lobby (ID: 0) starting at 6:10 PM! React to join!"
    );

    assert!(manager
        .run_idle_sweep_at(t0() + minutes(34))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        manager
            .run_idle_sweep_at(t0() + minutes(36))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_commands_end_to_end() {
    let system = create_test_system();

    system
        .dispatcher
        .dispatch(CTX, "$startlobby Halo now")
        .await
        .unwrap();
    system
        .dispatcher
        .dispatch(CTX, "$startlobby Doom 11:30 PM")
        .await
        .unwrap();

    let lobbies = system.manager.list_lobbies().await.unwrap();
    assert_eq!(lobbies.len(), 2);
    assert_eq!(
        system.notifier.sent_messages()[..2],
        [
            "Halo lobby (ID: 0) starting now! React to join!",
            "Doom lobby (ID: 1) starting at 11:30 PM! React to join!",
        ]
    );

    // Each announcement got the convenience reaction
    let reactions = system
        .notifier
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SinkCall::React { .. }))
        .count();
    assert_eq!(reactions, 2);

    system.dispatcher.dispatch(CTX, "$listlobbies").await.unwrap();
    let fields = system
        .notifier
        .calls()
        .into_iter()
        .find_map(|c| match c {
            SinkCall::Fields { fields, .. } => Some(fields),
            _ => None,
        })
        .unwrap();
    assert_eq!(fields.len(), 2);
    assert!(fields[0].value.contains("ID: 0"));
    assert!(fields[1].value.contains("Channel: <#10>"));

    system.dispatcher.dispatch(CTX, "$stoplobby 1").await.unwrap();
    system.dispatcher.dispatch(CTX, "$stoplobby 7").await.unwrap();
    let sent = system.notifier.sent_messages();
    assert_eq!(
        sent[sent.len() - 2..],
        ["Lobby 1 removed.", "Lobby 7 does not exist."]
    );

    // Ids are never reused after a removal
    system
        .dispatcher
        .dispatch(CTX, "$startlobby Quake now")
        .await
        .unwrap();
    assert_eq!(
        system.notifier.sent_messages().last().unwrap(),
        "Quake lobby (ID: 2) starting now! React to join!"
    );
}

#[tokio::test]
async fn test_reactions_on_stopped_lobby_ignored() {
    let system = create_test_system();
    let lobby = open_lobby_at(&system.manager, "Halo", t0(), t0()).await;
    let message = announcement_of(&lobby);

    assert!(system.manager.stop_lobby(0).await.unwrap());
    assert!(!system
        .manager
        .handle_reaction_add_at(&reaction(message, member(1, "Alice")), t0())
        .await
        .unwrap());
    assert!(system
        .manager
        .run_activation_sweep_at(t0() + minutes(1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_clear_comms_moves_present_members() {
    let system = create_test_system_with_voice(vec![
        voice_channel(300, "Overflow", 2),
        voice_channel(100, "General", 0),
        voice_channel(200, "Squad", 1),
    ]);
    let manager = &system.manager;

    // Alice and a stranger share General; Bob is not in voice
    manager
        .seed_presence(vec![
            (MemberId(1), ChannelRef(100)),
            (MemberId(7), ChannelRef(100)),
        ])
        .await
        .unwrap();
    let lobby = open_lobby_at(manager, "Halo", t0(), t0()).await;
    let message = announcement_of(&lobby);
    manager
        .handle_reaction_add_at(&reaction(message, member(1, "Alice")), t0())
        .await
        .unwrap();
    manager
        .handle_reaction_add_at(&reaction(message, member(2, "Bob")), t0())
        .await
        .unwrap();

    system.dispatcher.dispatch(CTX, "$clearcomms 0").await.unwrap();

    let moves: Vec<SinkCall> = system
        .notifier
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SinkCall::Move { .. }))
        .collect();
    assert_eq!(
        moves,
        vec![SinkCall::Move {
            guild: GUILD,
            member: MemberId(1),
            channel: ChannelRef(200),
        }]
    );
    assert_eq!(
        system.notifier.sent_messages().last().unwrap(),
        "Moved 1 member(s) of lobby 0 to <#200>."
    );
}

#[tokio::test]
async fn test_clear_comms_failures_are_replies() {
    let system = create_test_system_with_voice(vec![voice_channel(100, "General", 0)]);

    system.dispatcher.dispatch(CTX, "$clearcomms 0").await.unwrap();
    open_lobby_at(&system.manager, "Halo", t0(), t0()).await;
    system.dispatcher.dispatch(CTX, "$clearcomms 0").await.unwrap();

    system
        .manager
        .seed_presence(vec![(MemberId(1), ChannelRef(100))])
        .await
        .unwrap();
    system
        .manager
        .handle_reaction_add_at(
            &reaction(
                system.manager.get_lobby(0).await.unwrap().unwrap().message().unwrap(),
                member(1, "Alice"),
            ),
            t0(),
        )
        .await
        .unwrap();
    system.dispatcher.dispatch(CTX, "$clearcomms 0").await.unwrap();

    let sent = system.notifier.sent_messages();
    assert_eq!(sent[0], "Lobby 0 does not exist.");
    assert_eq!(
        sent[sent.len() - 2..],
        [
            "Nobody from lobby 0 is in a voice channel.",
            "There is no empty voice channel to move into.",
        ]
    );
    assert!(!system
        .notifier
        .calls()
        .iter()
        .any(|c| matches!(c, SinkCall::Move { .. })));
}

#[tokio::test]
async fn test_pick_game_single_choice() {
    let system = create_test_system();

    system
        .dispatcher
        .dispatch(CTX, "$pickgame Halo")
        .await
        .unwrap();

    let edits = system.notifier.edits();
    assert_eq!(edits.len(), 4);
    assert_eq!(
        edits.last().unwrap(),
        ":sparkles: The selected game is: Halo :sparkles:"
    );
}

#[tokio::test]
async fn test_announcement_failure_withdraws_lobby() {
    let system = create_test_system();
    system.notifier.fail("send_message");

    system
        .dispatcher
        .dispatch(CTX, "$startlobby Halo now")
        .await
        .unwrap();
    assert!(system.manager.list_lobbies().await.unwrap().is_empty());
    assert_eq!(system.manager.get_stats().await.unwrap().lobbies_created, 0);

    system.notifier.recover();
    system
        .dispatcher
        .dispatch(CTX, "$startlobby Halo now")
        .await
        .unwrap();
    assert_eq!(system.manager.list_lobbies().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_scheduler_pings_due_lobby_once() {
    let system = create_test_system();
    let manager = system.manager.clone();

    let now = chrono::Utc::now();
    let lobby = open_lobby_at(&manager, "Halo", now - chrono::Duration::seconds(1), now).await;
    manager
        .handle_reaction_add(&reaction(announcement_of(&lobby), member(1, "Alice")))
        .await
        .unwrap();

    let scheduler = Arc::new(LobbyScheduler::new(
        manager.clone(),
        Duration::from_millis(20),
        Duration::from_millis(20),
    ));
    assert!(scheduler.start().unwrap());
    assert!(!scheduler.start().unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.shutdown(Duration::from_secs(1)).await.unwrap();

    let pings = system
        .notifier
        .sent_messages()
        .into_iter()
        .filter(|m| m == "The Halo lobby is starting now! <@1>")
        .count();
    assert_eq!(pings, 1);
    assert_eq!(manager.get_stats().await.unwrap().activations, 1);
}
