//! Lobby manager orchestrating the registry, voice presence and rendering
//!
//! This module provides the core LobbyManager that creates and stops lobbies,
//! correlates reactions and voice events with lobbies, and runs the
//! activation and idle-expiry sweeps.

use crate::config::AppConfig;
use crate::discord::notifier::LobbyNotifier;
use crate::error::{CommandError, LobbyError, Result};
use crate::lobby::instance::Lobby;
use crate::lobby::presence::VoicePresence;
use crate::lobby::registry::LobbyRegistry;
use crate::lobby::schedule::StartSpec;
use crate::metrics::MetricsCollector;
use crate::types::{
    ChannelRef, GuildRef, ListingField, LobbyId, MemberId, ReactionEvent, RemovalReason,
    RemovedLobby, VoiceChannelInfo, VoiceStateChange,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Duration, Local, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Statistics about lobby manager operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct LobbyManagerStats {
    /// Total number of lobbies created
    pub lobbies_created: u64,
    /// Total number of lobbies removed by command
    pub lobbies_stopped: u64,
    /// Total number of lobbies retired for voice inactivity
    pub lobbies_expired: u64,
    /// Total number of lobbies activated
    pub activations: u64,
    /// Activation pings actually delivered
    pub pings_sent: u64,
    /// Roster joins through reactions
    pub roster_joins: u64,
    /// Roster leaves through reactions
    pub roster_leaves: u64,
    /// Current number of lobbies in the registry
    pub active_lobbies: usize,
}

/// Tunables the manager needs from the configuration
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Continuous voice absence after which a lobby is retired
    pub idle_timeout: Duration,
    /// Emotes to pick the convenience reaction from
    pub reaction_emotes: Vec<String>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ManagerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            reaction_emotes: config.bot.reaction_emotes.clone(),
        }
    }
}

/// Result of a successful `clearcomms`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearCommsOutcome {
    pub lobby_id: LobbyId,
    pub target: VoiceChannelInfo,
    pub moved: usize,
}

/// The main lobby manager
#[derive(Clone)]
pub struct LobbyManager {
    /// Live lobbies
    registry: Arc<LobbyRegistry>,
    /// Member -> voice channel table
    presence: Arc<VoicePresence>,
    /// Rendering sink for all user-visible output
    notifier: Arc<dyn LobbyNotifier>,
    settings: ManagerSettings,
    /// Manager statistics
    stats: Arc<RwLock<LobbyManagerStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
    /// The bot's own account, learned on connect
    bot_id: Arc<RwLock<Option<MemberId>>>,
}

impl LobbyManager {
    /// Create a new lobby manager with its own metrics registry
    pub fn new(notifier: Arc<dyn LobbyNotifier>, settings: ManagerSettings) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);
        Ok(Self::with_metrics(notifier, settings, metrics_collector))
    }

    /// Create a new lobby manager with metrics collector
    pub fn with_metrics(
        notifier: Arc<dyn LobbyNotifier>,
        settings: ManagerSettings,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry: Arc::new(LobbyRegistry::new()),
            presence: Arc::new(VoicePresence::new()),
            notifier,
            settings,
            stats: Arc::new(RwLock::new(LobbyManagerStats::default())),
            metrics_collector,
            bot_id: Arc::new(RwLock::new(None)),
        }
    }

    pub fn registry(&self) -> Arc<LobbyRegistry> {
        self.registry.clone()
    }

    pub fn notifier(&self) -> Arc<dyn LobbyNotifier> {
        self.notifier.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Remember the bot's own id so its reactions are ignored
    pub fn set_bot_id(&self, id: MemberId) -> Result<()> {
        let mut bot_id = self
            .bot_id
            .write()
            .map_err(|_| LobbyError::lock_poisoned("bot id"))?;
        *bot_id = Some(id);
        Ok(())
    }

    fn is_bot(&self, id: MemberId) -> Result<bool> {
        let bot_id = self
            .bot_id
            .read()
            .map_err(|_| LobbyError::lock_poisoned("bot id"))?;
        Ok(*bot_id == Some(id))
    }

    fn update_stats(&self, f: impl FnOnce(&mut LobbyManagerStats)) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| LobbyError::lock_poisoned("stats"))?;
        f(&mut stats);
        Ok(())
    }

    /// Create a lobby from a parsed start request, resolved in the host's zone
    pub async fn start_lobby(
        &self,
        game: &str,
        start: StartSpec,
        channel: ChannelRef,
        guild: Option<GuildRef>,
    ) -> std::result::Result<Lobby, CommandError> {
        let start_time = start.resolve(&Local::now())?;
        self.open_lobby(
            game,
            start_time,
            &start.to_string(),
            channel,
            guild,
            current_timestamp(),
        )
        .await
    }

    /// Register a lobby, post its announcement and add the convenience reaction
    ///
    /// If the announcement cannot be posted the lobby is withdrawn again: a
    /// lobby without a message could never gather a roster.
    pub async fn open_lobby(
        &self,
        game: &str,
        start_time: DateTime<Utc>,
        start_label: &str,
        channel: ChannelRef,
        guild: Option<GuildRef>,
        now: DateTime<Utc>,
    ) -> std::result::Result<Lobby, CommandError> {
        let lobby = self
            .registry
            .create(game, start_time, start_label, channel, guild, now)
            .map_err(internal)?;
        let lobby_id = lobby.id();
        let base = lobby.announcement_base();

        let message = match self.notifier.send_message(channel, &base).await {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to post announcement for lobby {}: {}", lobby_id, e);
                self.metrics_collector.record_sink_failure("send_message");
                self.registry.remove(lobby_id).map_err(internal)?;
                return Err(CommandError::Sink);
            }
        };

        self.registry
            .with_lobby_mut(lobby_id, |l| l.attach_announcement(message, base.clone()))
            .map_err(internal)?
            .transpose()
            .map_err(internal)?;

        self.update_stats(|stats| stats.lobbies_created += 1)
            .map_err(internal)?;
        self.metrics_collector.record_lobby_created();

        info!(
            "Created lobby {} for '{}' in channel {} starting {} ({})",
            lobby_id, game, channel, start_label, start_time
        );

        let emote = self
            .settings
            .reaction_emotes
            .choose(&mut rand::thread_rng())
            .cloned();
        if let Some(emote) = emote {
            if let Err(e) = self.notifier.add_reaction(channel, message, &emote).await {
                warn!("Failed to add reaction to lobby {}: {}", lobby_id, e);
                self.metrics_collector.record_sink_failure("add_reaction");
            }
        }

        self.refresh_announcement(lobby_id).await.map_err(internal)?;

        Ok(self
            .registry
            .find(lobby_id)
            .map_err(internal)?
            .unwrap_or(lobby))
    }

    /// Re-render a lobby's announcement from its current roster
    ///
    /// A failed edit is logged and left for the next roster change.
    pub async fn refresh_announcement(&self, lobby_id: LobbyId) -> Result<()> {
        let Some(lobby) = self.registry.find(lobby_id)? else {
            return Ok(());
        };
        let (Some(message), Some(content)) = (lobby.message(), lobby.render_announcement()) else {
            return Ok(());
        };

        if let Err(e) = self
            .notifier
            .edit_message(lobby.channel(), message, &content)
            .await
        {
            warn!("Failed to update announcement of lobby {}: {}", lobby_id, e);
            self.metrics_collector.record_sink_failure("edit_message");
        }
        Ok(())
    }

    /// Remove a lobby by id; false when it did not exist
    pub async fn stop_lobby(&self, lobby_id: LobbyId) -> Result<bool> {
        let Some(lobby) = self.registry.take(lobby_id)? else {
            debug!("Stop requested for unknown lobby {}", lobby_id);
            return Ok(false);
        };

        self.update_stats(|stats| stats.lobbies_stopped += 1)?;
        self.metrics_collector
            .record_lobby_removed(RemovalReason::Stopped);
        info!("Stopped lobby {} ({})", lobby_id, lobby.game());
        Ok(true)
    }

    /// Get information about a specific lobby
    pub async fn get_lobby(&self, lobby_id: LobbyId) -> Result<Option<Lobby>> {
        self.registry.find(lobby_id)
    }

    /// Get all live lobbies in creation order
    pub async fn list_lobbies(&self) -> Result<Vec<Lobby>> {
        self.registry.list()
    }

    /// Listing fields for every live lobby
    pub async fn listing_fields(&self) -> Result<Vec<ListingField>> {
        Ok(self
            .registry
            .list()?
            .iter()
            .map(Lobby::listing_field)
            .collect())
    }

    /// A member reacted to a message; joins the roster if it is an announcement
    pub async fn handle_reaction_add(&self, event: &ReactionEvent) -> Result<bool> {
        self.handle_reaction_add_at(event, current_timestamp()).await
    }

    pub async fn handle_reaction_add_at(
        &self,
        event: &ReactionEvent,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.is_bot(event.member.id)? {
            return Ok(false);
        }

        let present = self.presence.snapshot()?;
        let member = event.member.clone();
        let outcome = self.registry.with_message_mut(
            event.message_id,
            event.channel_id,
            |lobby| {
                let added = lobby.add_member(member, |m| present.contains_key(&m), now);
                (lobby.id(), added)
            },
        )?;

        let Some((lobby_id, added)) = outcome else {
            return Ok(false);
        };
        if !added {
            debug!(
                "Member {} already in roster of lobby {}",
                event.member.id, lobby_id
            );
            return Ok(false);
        }

        self.update_stats(|stats| stats.roster_joins += 1)?;
        self.metrics_collector.record_roster_change(true);
        debug!(
            "Member '{}' joined lobby {}",
            event.member.display_name, lobby_id
        );

        self.refresh_announcement(lobby_id).await?;
        Ok(true)
    }

    /// A member withdrew a reaction; leaves the roster if it is an announcement
    pub async fn handle_reaction_remove(&self, event: &ReactionEvent) -> Result<bool> {
        self.handle_reaction_remove_at(event, current_timestamp())
            .await
    }

    pub async fn handle_reaction_remove_at(
        &self,
        event: &ReactionEvent,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.is_bot(event.member.id)? {
            return Ok(false);
        }

        let present = self.presence.snapshot()?;
        let member_id = event.member.id;
        let outcome = self.registry.with_message_mut(
            event.message_id,
            event.channel_id,
            |lobby| {
                let removed = lobby.remove_member(member_id, |m| present.contains_key(&m), now);
                (lobby.id(), removed)
            },
        )?;

        let Some((lobby_id, true)) = outcome else {
            return Ok(false);
        };

        self.update_stats(|stats| stats.roster_leaves += 1)?;
        self.metrics_collector.record_roster_change(false);
        debug!("Member {} left lobby {}", member_id, lobby_id);

        self.refresh_announcement(lobby_id).await?;
        Ok(true)
    }

    /// Record a voice state change and stamp idle clocks of affected lobbies
    pub async fn handle_voice_state(&self, change: &VoiceStateChange) -> Result<()> {
        self.handle_voice_state_at(change, current_timestamp()).await
    }

    pub async fn handle_voice_state_at(
        &self,
        change: &VoiceStateChange,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let before = self.presence.snapshot()?;
        if !self.presence.apply(change)? {
            // Moved between channels: presence unchanged
            return Ok(());
        }
        let after = self.presence.snapshot()?;

        let member = change.member_id;
        self.registry.for_each_mut(|lobby| {
            if lobby.has_member(member) {
                let was = lobby.any_member_present(|m| before.contains_key(&m));
                let is = lobby.any_member_present(|m| after.contains_key(&m));
                lobby.record_voice_transition(was, is, now);
            }
        })?;

        debug!(
            "Voice state of member {}: {:?} -> {:?}",
            member, change.previous_channel, change.new_channel
        );
        Ok(())
    }

    /// Replace the presence table with a guild's current voice states
    pub async fn seed_presence(
        &self,
        states: impl IntoIterator<Item = (MemberId, ChannelRef)>,
    ) -> Result<()> {
        self.seed_presence_at(states, current_timestamp()).await
    }

    /// Seed presence and stamp the idle clock of every lobby whose roster
    /// crossed all-absent <-> any-present while events were not arriving
    pub async fn seed_presence_at(
        &self,
        states: impl IntoIterator<Item = (MemberId, ChannelRef)>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let before = self.presence.snapshot()?;
        self.presence.seed(states)?;
        let after = self.presence.snapshot()?;

        self.registry.for_each_mut(|lobby| {
            let was = lobby.any_member_present(|m| before.contains_key(&m));
            let is = lobby.any_member_present(|m| after.contains_key(&m));
            lobby.record_voice_transition(was, is, now);
        })?;

        debug!("Voice presence seeded with {} member(s)", after.len());
        Ok(())
    }

    pub fn presence(&self) -> Arc<VoicePresence> {
        self.presence.clone()
    }

    /// Ping every due lobby once; returns the ids activated in this pass
    pub async fn run_activation_sweep(&self) -> Result<Vec<LobbyId>> {
        self.run_activation_sweep_at(current_timestamp()).await
    }

    pub async fn run_activation_sweep_at(&self, now: DateTime<Utc>) -> Result<Vec<LobbyId>> {
        let timer = self.metrics_collector.start_timer();
        let due: Vec<LobbyId> = self
            .registry
            .list()?
            .iter()
            .filter(|lobby| lobby.is_due(now))
            .map(Lobby::id)
            .collect();

        let mut activated = Vec::new();
        for lobby_id in due {
            // Claim under the lock; the roster is whatever it holds right now
            let claim = self
                .registry
                .with_lobby_mut(lobby_id, |lobby| {
                    lobby
                        .claim_activation(now)
                        .map(|roster| (roster, lobby.game().to_string(), lobby.channel()))
                })?
                .flatten();

            let Some((roster, game, channel)) = claim else {
                debug!("Lobby {} removed or activated before its ping", lobby_id);
                continue;
            };

            if let Some(ping) = Lobby::ping_message(&roster, &game) {
                if let Err(e) = self.notifier.send_message(channel, &ping).await {
                    warn!(
                        "Failed to ping lobby {}, retrying next pass: {}",
                        lobby_id, e
                    );
                    self.metrics_collector.record_sink_failure("send_message");
                    self.registry
                        .with_lobby_mut(lobby_id, |lobby| lobby.release_activation())?;
                    continue;
                }
                self.update_stats(|stats| stats.pings_sent += 1)?;
            }

            self.update_stats(|stats| stats.activations += 1)?;
            self.metrics_collector.record_activation();
            info!(
                "Lobby {} ({}) is starting with {} player(s)",
                lobby_id,
                game,
                roster.len()
            );
            activated.push(lobby_id);
        }

        self.metrics_collector
            .record_sweep("activation", timer.stop());
        if activated.is_empty() {
            debug!("Activation sweep found nothing due");
        }
        Ok(activated)
    }

    /// Retire every lobby whose roster has been out of voice past the timeout
    pub async fn run_idle_sweep(&self) -> Result<Vec<RemovedLobby>> {
        self.run_idle_sweep_at(current_timestamp()).await
    }

    pub async fn run_idle_sweep_at(&self, now: DateTime<Utc>) -> Result<Vec<RemovedLobby>> {
        let timer = self.metrics_collector.start_timer();
        let timeout = self.settings.idle_timeout;
        let present = self.presence.snapshot()?;
        let candidates: Vec<LobbyId> = self
            .registry
            .list()?
            .iter()
            .filter(|lobby| lobby.is_idle(now, timeout, |m| present.contains_key(&m)))
            .map(Lobby::id)
            .collect();

        let mut removed = Vec::new();
        for lobby_id in candidates {
            // Re-check and take under the lock: it may have been stopped or revived since
            let present = self.presence.snapshot()?;
            let Some(lobby) = self.registry.take_if(lobby_id, |lobby| {
                lobby.is_idle(now, timeout, |m| present.contains_key(&m))
            })?
            else {
                continue;
            };

            if let Err(e) = self
                .notifier
                .send_message(lobby.channel(), &lobby.expiry_message(timeout))
                .await
            {
                warn!(
                    "Failed to post expiry notice for lobby {}, retrying next pass: {}",
                    lobby_id, e
                );
                self.metrics_collector.record_sink_failure("send_message");
                self.registry.restore(lobby)?;
                continue;
            }

            self.update_stats(|stats| stats.lobbies_expired += 1)?;
            self.metrics_collector
                .record_lobby_removed(RemovalReason::Idle);
            info!(
                "Lobby {} ({}) expired after voice inactivity",
                lobby_id,
                lobby.game()
            );
            removed.push(RemovedLobby {
                id: lobby_id,
                game: lobby.game().to_string(),
                reason: RemovalReason::Idle,
                removed_at: now,
            });
        }

        self.metrics_collector.record_sweep("idle", timer.stop());
        Ok(removed)
    }

    /// Move a lobby's voice-present members into the first empty voice channel
    pub async fn clear_comms(
        &self,
        lobby_id: LobbyId,
        guild: Option<GuildRef>,
    ) -> std::result::Result<ClearCommsOutcome, CommandError> {
        let guild = guild.ok_or(CommandError::NotInGuild)?;
        let lobby = self
            .registry
            .find(lobby_id)
            .map_err(internal)?
            .ok_or(CommandError::LobbyNotFound(lobby_id))?;

        let present = self.presence.snapshot().map_err(internal)?;
        let to_move: Vec<MemberId> = lobby
            .roster()
            .iter()
            .map(|m| m.id)
            .filter(|id| present.contains_key(id))
            .collect();
        if to_move.is_empty() {
            return Err(CommandError::NoPresentMembers(lobby_id));
        }

        let mut channels = self.notifier.voice_channels(guild).await.map_err(|e| {
            warn!("Failed to fetch voice channels of guild {}: {}", guild, e);
            self.metrics_collector.record_sink_failure("voice_channels");
            CommandError::Sink
        })?;
        channels.sort_by_key(|c| (c.position, c.id));

        let target = self
            .presence
            .occupancy(&channels)
            .map_err(internal)?
            .into_iter()
            .find(|o| o.member_count == 0)
            .map(|o| o.channel)
            .ok_or(CommandError::NoEmptyVoiceChannel)?;

        let mut moved = 0;
        for member in to_move {
            match self.notifier.move_member(guild, member, target.id).await {
                Ok(()) => moved += 1,
                Err(e) => {
                    warn!("Failed to move member {} to {}: {}", member, target.name, e);
                    self.metrics_collector.record_sink_failure("move_member");
                }
            }
        }
        if moved == 0 {
            return Err(CommandError::Sink);
        }

        info!(
            "Moved {} member(s) of lobby {} to '{}'",
            moved, lobby_id, target.name
        );
        Ok(ClearCommsOutcome {
            lobby_id,
            target,
            moved,
        })
    }

    /// Get current manager statistics
    pub async fn get_stats(&self) -> Result<LobbyManagerStats> {
        let active = self.registry.len()?;
        let mut stats = self
            .stats
            .read()
            .map_err(|_| LobbyError::lock_poisoned("stats"))?
            .clone();
        stats.active_lobbies = active;
        self.metrics_collector.update_from_lobby_stats(&stats);
        Ok(stats)
    }
}

/// Internal failure surfaced to a command caller
fn internal(e: anyhow::Error) -> CommandError {
    error!("Internal error while handling command: {}", e);
    CommandError::Sink
}
