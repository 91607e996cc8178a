//! Discord platform integration
//!
//! The rendering sink used by the lobby core, the gateway event handler and
//! client construction.

pub mod client;
pub mod handler;
pub mod notifier;

pub use client::{build_client, gateway_intents};
pub use handler::LobbyBotHandler;
pub use notifier::{LobbyNotifier, MockNotifier, SerenityNotifier, SinkCall};
