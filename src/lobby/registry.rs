//! Process-wide collection of live lobbies
//!
//! Ids are handed out from a monotonically increasing counter starting at 0
//! and are never reused, even after the lobby holding one is removed.

use crate::error::{LobbyError, Result};
use crate::lobby::instance::Lobby;
use crate::types::{ChannelRef, GuildRef, LobbyId, MessageRef};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// Ordered store of lobbies in creation order
#[derive(Debug, Default)]
pub struct LobbyRegistry {
    lobbies: RwLock<Vec<Lobby>>,
    next_id: AtomicU64,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new lobby and return a copy of it
    pub fn create(
        &self,
        game: &str,
        start_time: DateTime<Utc>,
        start_label: &str,
        channel: ChannelRef,
        guild: Option<GuildRef>,
        now: DateTime<Utc>,
    ) -> Result<Lobby> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        // Allocated under the write lock so list order matches id order
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let lobby = Lobby::new(id, game, start_time, start_label, channel, guild, now);
        lobbies.push(lobby.clone());

        debug!("Registered lobby {} for '{}'", id, game);
        Ok(lobby)
    }

    /// Remove a lobby, returning it if it existed
    pub fn take(&self, id: LobbyId) -> Result<Option<Lobby>> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        Ok(lobbies
            .iter()
            .position(|l| l.id() == id)
            .map(|idx| lobbies.remove(idx)))
    }

    /// Remove a lobby only if `predicate` holds for it under the write lock
    pub fn take_if(
        &self,
        id: LobbyId,
        predicate: impl FnOnce(&Lobby) -> bool,
    ) -> Result<Option<Lobby>> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        match lobbies.iter().position(|l| l.id() == id) {
            Some(idx) if predicate(&lobbies[idx]) => Ok(Some(lobbies.remove(idx))),
            _ => Ok(None),
        }
    }

    /// Put a previously taken lobby back in its creation-order slot
    pub fn restore(&self, lobby: Lobby) -> Result<()> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        match lobbies.binary_search_by_key(&lobby.id(), |l| l.id()) {
            Ok(_) => debug!("Lobby {} already present, not restored", lobby.id()),
            Err(idx) => lobbies.insert(idx, lobby),
        }
        Ok(())
    }

    /// Remove a lobby; false when no lobby had that id
    pub fn remove(&self, id: LobbyId) -> Result<bool> {
        Ok(self.take(id)?.is_some())
    }

    pub fn find(&self, id: LobbyId) -> Result<Option<Lobby>> {
        let lobbies = self
            .lobbies
            .read()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        Ok(lobbies.iter().find(|l| l.id() == id).cloned())
    }

    /// Find the lobby whose announcement is `message` in `channel`
    pub fn find_by_message(
        &self,
        message: MessageRef,
        channel: ChannelRef,
    ) -> Result<Option<Lobby>> {
        let lobbies = self
            .lobbies
            .read()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        Ok(lobbies
            .iter()
            .find(|l| l.matches_message(message, channel))
            .cloned())
    }

    /// Point-in-time copy of every lobby, in creation order
    ///
    /// Sweeps iterate over this copy so concurrent removals cannot disturb them.
    pub fn list(&self) -> Result<Vec<Lobby>> {
        let lobbies = self
            .lobbies
            .read()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        Ok(lobbies.clone())
    }

    pub fn len(&self) -> Result<usize> {
        let lobbies = self
            .lobbies
            .read()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        Ok(lobbies.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Run `f` against the lobby with `id` under the write lock
    ///
    /// Returns `None` when the lobby no longer exists.
    pub fn with_lobby_mut<R>(
        &self,
        id: LobbyId,
        f: impl FnOnce(&mut Lobby) -> R,
    ) -> Result<Option<R>> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        Ok(lobbies.iter_mut().find(|l| l.id() == id).map(f))
    }

    /// Run `f` against the lobby announced by `message` in `channel`
    pub fn with_message_mut<R>(
        &self,
        message: MessageRef,
        channel: ChannelRef,
        f: impl FnOnce(&mut Lobby) -> R,
    ) -> Result<Option<R>> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        Ok(lobbies
            .iter_mut()
            .find(|l| l.matches_message(message, channel))
            .map(f))
    }

    /// Apply `f` to every lobby under a single write lock
    pub fn for_each_mut(&self, mut f: impl FnMut(&mut Lobby)) -> Result<()> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))?;

        lobbies.iter_mut().for_each(|l| f(l));
        Ok(())
    }
}
