//! Text command parsing
//!
//! Turns a chat message into a [`Command`]. Messages that do not start with
//! the prefix, or name an unknown command, are not commands at all and yield
//! `None`; known commands with bad arguments yield a [`CommandError`].

use crate::error::CommandError;
use crate::lobby::schedule::StartSpec;
use crate::picker::GameChoices;
use crate::types::LobbyId;

/// A parsed, validated command
#[derive(Debug, Clone)]
pub enum Command {
    PickGame(GameChoices),
    StartLobby { game: String, start: StartSpec },
    StopLobby(LobbyId),
    ListLobbies,
    ClearComms(LobbyId),
}

impl Command {
    /// Command name as typed after the prefix
    pub fn name(&self) -> &'static str {
        match self {
            Command::PickGame(_) => "pickgame",
            Command::StartLobby { .. } => "startlobby",
            Command::StopLobby(_) => "stoplobby",
            Command::ListLobbies => "listlobbies",
            Command::ClearComms(_) => "clearcomms",
        }
    }
}

/// Parse `content` as a command under `prefix`
pub fn parse(prefix: &str, content: &str) -> Option<(&'static str, Result<Command, CommandError>)> {
    let body = content.trim().strip_prefix(prefix)?;
    let mut tokens = body.split_whitespace();
    let name = tokens.next()?;
    let args: Vec<&str> = tokens.collect();

    let (name, result) = match name {
        "pickgame" => ("pickgame", GameChoices::parse(&args).map(Command::PickGame)),
        "startlobby" => ("startlobby", parse_start_lobby(prefix, &args)),
        "stoplobby" => (
            "stoplobby",
            single_id(prefix, "stoplobby", &args).map(Command::StopLobby),
        ),
        "listlobbies" => ("listlobbies", Ok(Command::ListLobbies)),
        "clearcomms" => (
            "clearcomms",
            single_id(prefix, "clearcomms", &args).map(Command::ClearComms),
        ),
        _ => return None,
    };
    Some((name, result))
}

fn parse_start_lobby(prefix: &str, args: &[&str]) -> Result<Command, CommandError> {
    // `3:00PM` and `3:00 PM` both arrive here; the latter as two tokens
    let (game, time) = match args {
        [game, time] => (*game, time.to_string()),
        [game, time, meridiem] => (*game, format!("{} {}", time, meridiem)),
        _ => {
            return Err(CommandError::usage(format!(
                "{}startlobby <game> <time>",
                prefix
            )))
        }
    };

    let start = StartSpec::parse(&time)?;
    Ok(Command::StartLobby {
        game: game.to_string(),
        start,
    })
}

fn single_id(prefix: &str, command: &str, args: &[&str]) -> Result<LobbyId, CommandError> {
    match args {
        [id] => parse_lobby_id(id),
        _ => Err(CommandError::usage(format!("{}{} <ID>", prefix, command))),
    }
}

/// Lobby ids are non-negative integers
pub fn parse_lobby_id(token: &str) -> Result<LobbyId, CommandError> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(CommandError::InvalidId);
    }
    token.parse().map_err(|_| CommandError::InvalidId)
}
