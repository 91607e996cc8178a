//! Performance benchmarks for the lobby sweeps and command parsing

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lobby_bot::command::parse;
use lobby_bot::discord::MockNotifier;
use lobby_bot::lobby::{LobbyManager, ManagerSettings};
use lobby_bot::picker::GameChoices;
use lobby_bot::types::{ChannelRef, GuildRef, MemberId, ReactionEvent, RosterMember};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const LOBBIES: i64 = 200;

/// Manager holding `LOBBIES` lobbies with a few players each
fn create_bench_system(rt: &tokio::runtime::Runtime) -> LobbyManager {
    let manager =
        LobbyManager::new(Arc::new(MockNotifier::new()), ManagerSettings::default()).unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();

    rt.block_on(async {
        for i in 0..LOBBIES {
            let lobby = manager
                .open_lobby(
                    &format!("Game{}", i),
                    t0 + Duration::minutes(i % 30),
                    "now",
                    ChannelRef(10),
                    Some(GuildRef(1)),
                    t0,
                )
                .await
                .unwrap();
            for player in 0..4u64 {
                let event = ReactionEvent {
                    message_id: lobby.message().unwrap(),
                    channel_id: ChannelRef(10),
                    member: RosterMember::new(MemberId(player), format!("Player{}", player)),
                };
                manager.handle_reaction_add_at(&event, t0).await.unwrap();
            }
        }
    });

    manager
}

fn bench_activation_sweep(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 17, 0, 0).unwrap();
    let manager = create_bench_system(&rt);

    // Nothing is due an hour early, so every pass scans the full registry
    c.bench_function("activation_sweep_200_lobbies", |b| {
        b.iter(|| {
            rt.block_on(async {
                let activated = manager.run_activation_sweep_at(black_box(now)).await.unwrap();
                black_box(activated)
            })
        })
    });
}

fn bench_idle_sweep(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 18, 1, 0).unwrap();
    let manager = create_bench_system(&rt);

    c.bench_function("idle_sweep_200_lobbies", |b| {
        b.iter(|| {
            rt.block_on(async {
                let removed = manager.run_idle_sweep_at(black_box(now)).await.unwrap();
                black_box(removed)
            })
        })
    });
}

fn bench_command_parsing(c: &mut Criterion) {
    c.bench_function("parse_startlobby", |b| {
        b.iter(|| black_box(parse("$", black_box("$startlobby Halo 11:30 PM"))))
    });

    c.bench_function("parse_weighted_pickgame", |b| {
        b.iter(|| {
            black_box(parse(
                "$",
                black_box("$pickgame Halo 1 Doom 2 Quake 3 Unreal 4"),
            ))
        })
    });
}

fn bench_game_draw(c: &mut Criterion) {
    let choices = GameChoices::parse(&["Halo", "1", "Doom", "2", "Quake", "3"]).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("weighted_draw", |b| {
        b.iter(|| black_box(choices.draw(&mut rng)))
    });
}

criterion_group!(
    benches,
    bench_activation_sweep,
    bench_idle_sweep,
    bench_command_parsing,
    bench_game_draw
);
criterion_main!(benches);
