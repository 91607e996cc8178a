//! Gateway client construction

use crate::discord::handler::LobbyBotHandler;
use crate::error::Result;
use serenity::all::{Client, GatewayIntents};

/// Intents the bot needs: commands, reactions and voice presence
///
/// MESSAGE_CONTENT and GUILD_MEMBERS are privileged and must be enabled in
/// the developer portal.
pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MEMBERS
}

/// Build the gateway client; it connects when started
pub async fn build_client(token: &str, handler: LobbyBotHandler) -> Result<Client> {
    let client = Client::builder(token, gateway_intents())
        .event_handler(handler)
        .await?;
    Ok(client)
}
