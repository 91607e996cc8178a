//! Command execution
//!
//! Runs parsed commands against the lobby manager and renders every outcome,
//! success or failure, as a reply in the invoking channel.

use crate::command::parser::{self, Command};
use crate::config::AppConfig;
use crate::discord::notifier::LobbyNotifier;
use crate::error::{CommandError, Result};
use crate::lobby::manager::LobbyManager;
use crate::metrics::MetricsCollector;
use crate::picker::{self, GameChoices};
use crate::types::{ChannelRef, GuildRef};
use crate::utils::mention_channel;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a command was typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    pub channel: ChannelRef,
    pub guild: Option<GuildRef>,
}

/// Pick-game animation settings
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub prefix: String,
    pub roll_count: usize,
    pub roll_delay: Duration,
}

impl DispatcherSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            prefix: config.bot.command_prefix.clone(),
            roll_count: config.scheduler.roll_count,
            roll_delay: config.roll_delay(),
        }
    }
}

pub struct CommandDispatcher {
    manager: Arc<LobbyManager>,
    notifier: Arc<dyn LobbyNotifier>,
    metrics_collector: Arc<MetricsCollector>,
    settings: DispatcherSettings,
}

impl CommandDispatcher {
    pub fn new(manager: Arc<LobbyManager>, settings: DispatcherSettings) -> Self {
        Self {
            notifier: manager.notifier(),
            metrics_collector: manager.metrics(),
            manager,
            settings,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.settings.prefix
    }

    /// Handle a chat message; returns false when it was not a command
    pub async fn dispatch(&self, ctx: CommandContext, content: &str) -> Result<bool> {
        let Some((name, parsed)) = parser::parse(&self.settings.prefix, content) else {
            return Ok(false);
        };

        let start = Instant::now();
        let outcome = match parsed {
            Ok(command) => self.execute(ctx, command).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.metrics_collector.record_command(name, true);
                debug!(
                    "Command '{}' in channel {} completed in {:.2}ms",
                    name,
                    ctx.channel,
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                self.metrics_collector.record_command(name, false);
                debug!("Command '{}' rejected: {:?}", name, e);
                self.reply(ctx.channel, &e.to_string()).await;
            }
        }
        Ok(true)
    }

    async fn execute(
        &self,
        ctx: CommandContext,
        command: Command,
    ) -> std::result::Result<(), CommandError> {
        match command {
            Command::PickGame(choices) => self.pick_game(ctx.channel, &choices).await,
            Command::StartLobby { game, start } => {
                self.manager
                    .start_lobby(&game, start, ctx.channel, ctx.guild)
                    .await?;
                Ok(())
            }
            Command::StopLobby(lobby_id) => {
                let removed = self
                    .manager
                    .stop_lobby(lobby_id)
                    .await
                    .map_err(|e| self.sink_error("stop_lobby", e))?;
                if !removed {
                    return Err(CommandError::LobbyNotFound(lobby_id));
                }
                self.send(ctx.channel, &format!("Lobby {} removed.", lobby_id))
                    .await
            }
            Command::ListLobbies => {
                let fields = self
                    .manager
                    .listing_fields()
                    .await
                    .map_err(|e| self.sink_error("list_lobbies", e))?;
                if fields.is_empty() {
                    return self.send(ctx.channel, "There are no active lobbies.").await;
                }
                self.notifier
                    .send_fields(ctx.channel, "Active Lobbies", &fields)
                    .await
                    .map_err(|e| self.sink_error("send_fields", e))?;
                Ok(())
            }
            Command::ClearComms(lobby_id) => {
                let outcome = self.manager.clear_comms(lobby_id, ctx.guild).await?;
                self.send(
                    ctx.channel,
                    &format!(
                        "Moved {} member(s) of lobby {} to {}.",
                        outcome.moved,
                        lobby_id,
                        mention_channel(outcome.target.id)
                    ),
                )
                .await
            }
        }
    }

    /// Post the rolling animation, then the pick drawn up front
    async fn pick_game(
        &self,
        channel: ChannelRef,
        choices: &GameChoices,
    ) -> std::result::Result<(), CommandError> {
        let (pick, frames) = {
            let mut rng = rand::thread_rng();
            (
                choices.draw(&mut rng),
                choices.roll_frames(self.settings.roll_count, &mut rng),
            )
        };

        let message = self
            .notifier
            .send_message(channel, "The selected game is: ")
            .await
            .map_err(|e| self.sink_error("send_message", e))?;

        for frame in &frames {
            self.notifier
                .edit_message(channel, message, &picker::roll_message(frame))
                .await
                .map_err(|e| self.sink_error("edit_message", e))?;
            tokio::time::sleep(self.settings.roll_delay).await;
        }

        self.notifier
            .edit_message(channel, message, &picker::result_message(&pick))
            .await
            .map_err(|e| self.sink_error("edit_message", e))?;

        info!("Picked '{}' from {} option(s)", pick, choices.games().len());
        Ok(())
    }

    async fn send(&self, channel: ChannelRef, content: &str) -> std::result::Result<(), CommandError> {
        self.notifier
            .send_message(channel, content)
            .await
            .map_err(|e| self.sink_error("send_message", e))?;
        Ok(())
    }

    /// Best-effort error reply; failures are only logged
    async fn reply(&self, channel: ChannelRef, content: &str) {
        if let Err(e) = self.notifier.send_message(channel, content).await {
            warn!("Failed to send reply to channel {}: {}", channel, e);
            self.metrics_collector.record_sink_failure("send_message");
        }
    }

    fn sink_error(&self, operation: &str, e: anyhow::Error) -> CommandError {
        warn!("Command step '{}' failed: {}", operation, e);
        self.metrics_collector.record_sink_failure(operation);
        CommandError::Sink
    }
}
