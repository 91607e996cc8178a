//! Error types for the lobby bot
//!
//! Internal operations use anyhow for consistent propagation. Errors that are
//! shown to the user who typed a command live in [`CommandError`]; their
//! `Display` text is the reply.

use crate::types::LobbyId;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Internal failures raised by the lobby core and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found: {lobby_id}")]
    LobbyNotFound { lobby_id: LobbyId },

    #[error("Lobby {lobby_id} already has an announcement message")]
    AnnouncementAlreadySet { lobby_id: LobbyId },

    #[error("Rendering sink call '{operation}' failed: {message}")]
    SinkFailed { operation: String, message: String },

    #[error("Rendering sink call '{operation}' timed out after {seconds}s")]
    SinkTimeout { operation: String, seconds: u64 },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl LobbyError {
    pub(crate) fn lock_poisoned(what: &str) -> Self {
        LobbyError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

/// User-visible command failures
///
/// None of these reach the registry: they are raised while validating input or
/// looking up a lobby and are rendered back to the invoking channel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid input. Use the format: `{usage}`")]
    Usage { usage: String },

    #[error("Invalid time format. Please use 'xx:xx AM/PM' or 'now'.")]
    InvalidTime,

    #[error("Invalid ID format. ID should be an integer.")]
    InvalidId,

    #[error("Probability values must be greater than zero.")]
    InvalidWeight,

    #[error(
        "Please provide at least one game name, or pairs of game names and their probabilities."
    )]
    EmptyChoices,

    #[error("Lobby {0} does not exist.")]
    LobbyNotFound(LobbyId),

    #[error("Nobody from lobby {0} is in a voice channel.")]
    NoPresentMembers(LobbyId),

    #[error("There is no empty voice channel to move into.")]
    NoEmptyVoiceChannel,

    #[error("This command can only be used inside a server.")]
    NotInGuild,

    #[error("Something went wrong talking to Discord, please try again.")]
    Sink,
}

impl CommandError {
    pub fn usage(usage: impl Into<String>) -> Self {
        CommandError::Usage {
            usage: usage.into(),
        }
    }
}
