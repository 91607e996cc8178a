//! Lobby Bot - Discord bot for scheduling game lobbies
//!
//! Members announce lobbies for a time of day and join them by reacting to
//! the announcement. The bot pings the roster at start time, retires lobbies
//! whose roster has left voice, and can pick a random game.

pub mod command;
pub mod config;
pub mod discord;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod picker;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{CommandError, LobbyError, Result};
pub use types::*;

// Re-export key components
pub use command::CommandDispatcher;
pub use discord::{LobbyNotifier, MockNotifier};
pub use lobby::{LobbyManager, LobbyScheduler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
