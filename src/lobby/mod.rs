//! Lobby management for the bot
//!
//! This module handles the lobby entity and its lifecycle, the registry of
//! live lobbies, start-time resolution, voice presence tracking and the
//! periodic sweeps that activate and retire lobbies.

pub mod instance;
pub mod manager;
pub mod presence;
pub mod registry;
pub mod schedule;
pub mod scheduler;

// Re-export commonly used types
pub use instance::{Lobby, LobbyState};
pub use manager::{ClearCommsOutcome, LobbyManager, LobbyManagerStats, ManagerSettings};
pub use presence::VoicePresence;
pub use registry::LobbyRegistry;
pub use schedule::StartSpec;
pub use scheduler::LobbyScheduler;
