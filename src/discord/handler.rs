//! Gateway event handler
//!
//! Translates serenity events into command dispatches and lobby event-feed
//! calls. Failures are logged here; nothing is returned to serenity.

use crate::command::{CommandContext, CommandDispatcher};
use crate::lobby::{LobbyManager, LobbyScheduler};
use crate::types::{ChannelRef, GuildRef, MemberId, ReactionEvent, RosterMember, VoiceStateChange};
use serenity::all::{Context, EventHandler, Guild, Message, Reaction, Ready, VoiceState};
use serenity::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Discord bot event handler
pub struct LobbyBotHandler {
    manager: Arc<LobbyManager>,
    dispatcher: Arc<CommandDispatcher>,
    scheduler: Arc<LobbyScheduler>,
    standby_channel: Option<ChannelRef>,
    gateway_ready: Arc<AtomicBool>,
}

impl LobbyBotHandler {
    pub fn new(
        manager: Arc<LobbyManager>,
        dispatcher: Arc<CommandDispatcher>,
        scheduler: Arc<LobbyScheduler>,
        standby_channel: Option<ChannelRef>,
        gateway_ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            manager,
            dispatcher,
            scheduler,
            standby_channel,
            gateway_ready,
        }
    }

    /// Resolve the reacting member's display name
    async fn reaction_member(&self, ctx: &Context, reaction: &Reaction) -> Option<RosterMember> {
        let user_id = reaction.user_id?;
        if let Some(member) = &reaction.member {
            return Some(RosterMember::new(
                MemberId(user_id.get()),
                member.display_name(),
            ));
        }

        let guild_id = reaction.guild_id?;
        match guild_id.member(ctx, user_id).await {
            Ok(member) => Some(RosterMember::new(
                MemberId(user_id.get()),
                member.display_name(),
            )),
            Err(e) => {
                debug!("Could not resolve member {} of guild {}: {}", user_id, guild_id, e);
                None
            }
        }
    }

    async fn reaction_event(&self, ctx: &Context, reaction: &Reaction) -> Option<ReactionEvent> {
        // Reactions outside guilds can never belong to a lobby
        reaction.guild_id?;
        let member = self.reaction_member(ctx, reaction).await?;
        Some(ReactionEvent {
            message_id: reaction.message_id.get().into(),
            channel_id: reaction.channel_id.get().into(),
            member,
        })
    }
}

#[async_trait]
impl EventHandler for LobbyBotHandler {
    /// Called when the bot is ready and connected to Discord
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected to Discord!", ready.user.name);
        self.gateway_ready.store(true, Ordering::SeqCst);

        if let Err(e) = self.manager.set_bot_id(MemberId(ready.user.id.get())) {
            error!("Failed to record bot id: {}", e);
        }

        if let Some(channel) = self.standby_channel {
            if let Err(e) = self.manager.notifier().send_message(channel, "On standby").await {
                warn!("Failed to post standby notice to channel {}: {}", channel, e);
            }
        }

        match self.scheduler.start() {
            Ok(true) => info!("Lobby checker task started"),
            Ok(false) => debug!("Reconnected; lobby checker already running"),
            Err(e) => error!("Failed to start lobby scheduler: {}", e),
        }
    }

    /// Called when a guild becomes available; seeds voice presence
    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        let states: Vec<(MemberId, ChannelRef)> = guild
            .voice_states
            .values()
            .filter_map(|state| {
                state
                    .channel_id
                    .map(|channel| (MemberId(state.user_id.get()), ChannelRef(channel.get())))
            })
            .collect();

        debug!(
            "Guild create event: {} ({}) - {} member(s) in voice",
            guild.name,
            guild.id,
            states.len()
        );

        if let Err(e) = self.manager.seed_presence(states).await {
            error!("Failed to seed voice presence for guild {}: {}", guild.id, e);
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let ctx = CommandContext {
            channel: ChannelRef(msg.channel_id.get()),
            guild: msg.guild_id.map(|g| GuildRef(g.get())),
        };
        if let Err(e) = self.dispatcher.dispatch(ctx, &msg.content).await {
            error!("Failed to handle message {}: {}", msg.id, e);
        }
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        let Some(event) = self.reaction_event(&ctx, &add_reaction).await else {
            return;
        };
        if let Err(e) = self.manager.handle_reaction_add(&event).await {
            error!("Failed to handle reaction add: {}", e);
        }
    }

    async fn reaction_remove(&self, ctx: Context, removed_reaction: Reaction) {
        let Some(event) = self.reaction_event(&ctx, &removed_reaction).await else {
            return;
        };
        if let Err(e) = self.manager.handle_reaction_remove(&event).await {
            error!("Failed to handle reaction remove: {}", e);
        }
    }

    async fn voice_state_update(&self, _ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let change = VoiceStateChange {
            member_id: MemberId(new.user_id.get()),
            previous_channel: old
                .and_then(|state| state.channel_id)
                .map(|c| ChannelRef(c.get())),
            new_channel: new.channel_id.map(|c| ChannelRef(c.get())),
        };
        if let Err(e) = self.manager.handle_voice_state(&change).await {
            error!("Failed to handle voice state update: {}", e);
        }
    }
}
