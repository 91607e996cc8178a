//! Lobby entity and lifecycle state machine
//!
//! A lobby is `Scheduled` until its start time passes and the activation sweep
//! pings the roster, then `Active` until it is stopped or expires. Closed
//! lobbies are not represented: absence from the registry is the closed state.

use crate::error::{LobbyError, Result};
use crate::types::{ChannelRef, GuildRef, ListingField, LobbyId, MemberId, MessageRef, RosterMember};
use crate::utils::mention_channel;
use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

/// Possible states of a lobby still held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyState {
    /// Created, start time not reached or not yet swept
    Scheduled,
    /// Start time reached and roster pinged
    Active,
}

/// One scheduled gathering for a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    id: LobbyId,
    game: String,
    start_time: DateTime<Utc>,
    /// Human wording of the requested start (`now`, `at 3:00 PM`)
    start_label: String,
    channel: ChannelRef,
    guild: Option<GuildRef>,
    message: Option<MessageRef>,
    announcement: Option<String>,
    roster: Vec<RosterMember>,
    pinged: bool,
    last_voice_activity: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Lobby {
    /// Create a lobby with an already resolved start time
    ///
    /// The idle clock starts at the later of creation and start time, so a
    /// lobby scheduled hours ahead is not retired before it begins.
    pub fn new(
        id: LobbyId,
        game: impl Into<String>,
        start_time: DateTime<Utc>,
        start_label: impl Into<String>,
        channel: ChannelRef,
        guild: Option<GuildRef>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            game: game.into(),
            start_time,
            start_label: start_label.into(),
            channel,
            guild,
            message: None,
            announcement: None,
            roster: Vec::new(),
            pinged: false,
            last_voice_activity: start_time.max(now),
            created_at: now,
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn channel(&self) -> ChannelRef {
        self.channel
    }

    pub fn guild(&self) -> Option<GuildRef> {
        self.guild
    }

    pub fn message(&self) -> Option<MessageRef> {
        self.message
    }

    pub fn roster(&self) -> &[RosterMember] {
        &self.roster
    }

    pub fn is_pinged(&self) -> bool {
        self.pinged
    }

    pub fn last_voice_activity(&self) -> DateTime<Utc> {
        self.last_voice_activity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> LobbyState {
        if self.pinged {
            LobbyState::Active
        } else {
            LobbyState::Scheduled
        }
    }

    /// Announcement text before any roster is appended
    pub fn announcement_base(&self) -> String {
        format!(
            "{} lobby (ID: {}) starting {}! React to join!",
            self.game, self.id, self.start_label
        )
    }

    /// Record the posted announcement; allowed once
    pub fn attach_announcement(&mut self, message: MessageRef, content: String) -> Result<()> {
        if self.message.is_some() {
            return Err(LobbyError::AnnouncementAlreadySet { lobby_id: self.id }.into());
        }
        self.message = Some(message);
        self.announcement = Some(content);
        Ok(())
    }

    /// Whether a reaction on this message/channel pair belongs to this lobby
    pub fn matches_message(&self, message: MessageRef, channel: ChannelRef) -> bool {
        self.message == Some(message) && self.channel == channel
    }

    pub fn has_member(&self, member: MemberId) -> bool {
        self.roster.iter().any(|m| m.id == member)
    }

    /// Add a member; returns false if already present
    ///
    /// `is_present` reports current voice presence, used to detect the roster
    /// crossing between "all absent" and "someone present".
    pub fn add_member(
        &mut self,
        member: RosterMember,
        is_present: impl Fn(MemberId) -> bool,
        now: DateTime<Utc>,
    ) -> bool {
        if self.has_member(member.id) {
            return false;
        }
        let before = self.any_member_present(&is_present);
        self.roster.push(member);
        let after = self.any_member_present(&is_present);
        self.record_voice_transition(before, after, now);
        true
    }

    /// Remove a member; returns false if they were not in the roster
    pub fn remove_member(
        &mut self,
        member: MemberId,
        is_present: impl Fn(MemberId) -> bool,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.has_member(member) {
            return false;
        }
        let before = self.any_member_present(&is_present);
        self.roster.retain(|m| m.id != member);
        let after = self.any_member_present(&is_present);
        self.record_voice_transition(before, after, now);
        true
    }

    pub fn any_member_present(&self, is_present: impl Fn(MemberId) -> bool) -> bool {
        self.roster.iter().any(|m| is_present(m.id))
    }

    /// Stamp the idle clock when the roster crosses all-absent <-> any-present
    pub fn record_voice_transition(&mut self, before: bool, after: bool, now: DateTime<Utc>) {
        if before != after {
            self.last_voice_activity = now;
        }
    }

    /// Start time reached and not yet pinged
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.pinged && now >= self.start_time
    }

    /// Atomically take the single activation of this lobby
    ///
    /// Returns the roster to ping, resolved at fire time, or `None` when the
    /// lobby is not due or was already activated.
    pub fn claim_activation(&mut self, now: DateTime<Utc>) -> Option<Vec<RosterMember>> {
        if !self.is_due(now) {
            return None;
        }
        self.pinged = true;
        Some(self.roster.clone())
    }

    /// Undo a claim whose ping could not be delivered
    pub fn release_activation(&mut self) {
        self.pinged = false;
    }

    /// Every roster member voice-absent for longer than `timeout`
    pub fn is_idle(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
        is_present: impl Fn(MemberId) -> bool,
    ) -> bool {
        !self.any_member_present(is_present) && now - self.last_voice_activity > timeout
    }

    /// Comma separated display names in join order
    pub fn player_names(&self) -> String {
        self.roster
            .iter()
            .map(|m| m.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Current announcement text including the roster, if posted
    pub fn render_announcement(&self) -> Option<String> {
        let base = self.announcement.as_ref()?;
        if self.roster.is_empty() {
            Some(base.clone())
        } else {
            Some(format!("{}\n\nCurrent players: {}", base, self.player_names()))
        }
    }

    /// Activation ping text; `None` when nobody joined
    pub fn ping_message(roster: &[RosterMember], game: &str) -> Option<String> {
        if roster.is_empty() {
            return None;
        }
        let mentions = roster
            .iter()
            .map(|m| m.mention())
            .collect::<Vec<_>>()
            .join(" ");
        Some(format!("The {} lobby is starting now! {}", game, mentions))
    }

    /// Notice posted to the origin channel when the lobby idles out
    pub fn expiry_message(&self, timeout: Duration) -> String {
        format!(
            "Lobby {} ({}) closed after {} minutes of voice inactivity.",
            self.id,
            self.game,
            timeout.num_minutes()
        )
    }

    /// One field of the lobby listing, times shown in the host's local zone
    pub fn listing_field(&self) -> ListingField {
        let start = self
            .start_time
            .with_timezone(&Local)
            .format("%Y-%m-%d %I:%M %p");
        ListingField {
            name: self.game.clone(),
            value: format!(
                "Start Time: {}\nPlayers: {}\nChannel: {}\nID: {}",
                start,
                self.player_names(),
                mention_channel(self.channel),
                self.id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-14T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn create_test_lobby(start_offset_secs: i64) -> Lobby {
        Lobby::new(
            3,
            "Halo",
            t0() + Duration::seconds(start_offset_secs),
            "now",
            ChannelRef(10),
            Some(GuildRef(1)),
            t0(),
        )
    }

    fn member(id: u64, name: &str) -> RosterMember {
        RosterMember::new(MemberId(id), name)
    }

    fn nobody(_: MemberId) -> bool {
        false
    }

    #[test]
    fn test_lobby_creation() {
        let lobby = create_test_lobby(0);
        assert_eq!(lobby.state(), LobbyState::Scheduled);
        assert!(!lobby.is_pinged());
        assert!(lobby.roster().is_empty());
        assert!(lobby.message().is_none());
        assert_eq!(lobby.last_voice_activity(), t0());
        assert_eq!(
            lobby.announcement_base(),
            "Halo lobby (ID: 3) starting now! React to join!"
        );
    }

    #[test]
    fn test_idle_clock_starts_at_start_time() {
        let lobby = create_test_lobby(3600);
        assert_eq!(lobby.last_voice_activity(), t0() + Duration::hours(1));
    }

    #[test]
    fn test_announcement_set_once() {
        let mut lobby = create_test_lobby(0);
        assert!(lobby.render_announcement().is_none());

        lobby
            .attach_announcement(MessageRef(99), lobby.announcement_base())
            .unwrap();
        assert!(lobby.matches_message(MessageRef(99), ChannelRef(10)));
        assert!(!lobby.matches_message(MessageRef(99), ChannelRef(11)));
        assert!(!lobby.matches_message(MessageRef(98), ChannelRef(10)));

        assert!(lobby
            .attach_announcement(MessageRef(100), "again".to_string())
            .is_err());
        assert_eq!(lobby.message(), Some(MessageRef(99)));
    }

    #[test]
    fn test_roster_add_remove_idempotent() {
        let mut lobby = create_test_lobby(0);

        assert!(lobby.add_member(member(1, "ana"), nobody, t0()));
        assert!(!lobby.add_member(member(1, "ana"), nobody, t0()));
        assert!(lobby.add_member(member(2, "bo"), nobody, t0()));
        assert_eq!(lobby.roster().len(), 2);
        assert_eq!(lobby.player_names(), "ana, bo");

        assert!(lobby.remove_member(MemberId(1), nobody, t0()));
        assert!(!lobby.remove_member(MemberId(1), nobody, t0()));
        assert!(!lobby.remove_member(MemberId(42), nobody, t0()));
        assert_eq!(lobby.player_names(), "bo");
    }

    #[test]
    fn test_render_announcement_with_roster() {
        let mut lobby = create_test_lobby(0);
        lobby
            .attach_announcement(MessageRef(5), lobby.announcement_base())
            .unwrap();
        lobby.add_member(member(1, "ana"), nobody, t0());
        lobby.add_member(member(2, "bo"), nobody, t0());

        assert_eq!(
            lobby.render_announcement().unwrap(),
            "Halo lobby (ID: 3) starting now! React to join!\n\nCurrent players: ana, bo"
        );

        lobby.remove_member(MemberId(1), nobody, t0());
        lobby.remove_member(MemberId(2), nobody, t0());
        assert_eq!(
            lobby.render_announcement().unwrap(),
            "Halo lobby (ID: 3) starting now! React to join!"
        );
    }

    #[test]
    fn test_activation_claimed_once() {
        let mut lobby = create_test_lobby(60);
        lobby.add_member(member(1, "ana"), nobody, t0());

        // Not due yet
        assert!(lobby.claim_activation(t0()).is_none());

        let roster = lobby.claim_activation(t0() + Duration::seconds(60)).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(lobby.state(), LobbyState::Active);

        // Second pass never fires again
        assert!(lobby.claim_activation(t0() + Duration::hours(2)).is_none());
    }

    #[test]
    fn test_release_activation_allows_retry() {
        let mut lobby = create_test_lobby(0);
        assert!(lobby.claim_activation(t0()).is_some());
        lobby.release_activation();
        assert!(lobby.is_due(t0()));
        assert!(lobby.claim_activation(t0()).is_some());
    }

    #[test]
    fn test_ping_message() {
        let roster = vec![member(1, "ana"), member(2, "bo")];
        assert_eq!(
            Lobby::ping_message(&roster, "Halo").unwrap(),
            "The Halo lobby is starting now! <@1> <@2>"
        );
        assert!(Lobby::ping_message(&[], "Halo").is_none());
    }

    #[test]
    fn test_voice_transition_stamps_idle_clock() {
        let mut lobby = create_test_lobby(0);
        let present: HashSet<MemberId> = [MemberId(1)].into_iter().collect();
        let later = t0() + Duration::seconds(120);

        // Adding a member already in voice crosses all-absent -> present
        lobby.add_member(member(1, "ana"), |m| present.contains(&m), later);
        assert_eq!(lobby.last_voice_activity(), later);

        // Adding an absent member changes nothing
        let even_later = later + Duration::seconds(30);
        lobby.add_member(member(2, "bo"), |m| present.contains(&m), even_later);
        assert_eq!(lobby.last_voice_activity(), later);

        lobby.record_voice_transition(true, true, even_later);
        assert_eq!(lobby.last_voice_activity(), later);
        lobby.record_voice_transition(true, false, even_later);
        assert_eq!(lobby.last_voice_activity(), even_later);
    }

    #[test]
    fn test_idle_threshold() {
        let timeout = Duration::seconds(300);
        let lobby = create_test_lobby(0);

        assert!(!lobby.is_idle(t0() + Duration::seconds(299), timeout, nobody));
        assert!(!lobby.is_idle(t0() + Duration::seconds(300), timeout, nobody));
        assert!(lobby.is_idle(t0() + Duration::seconds(301), timeout, nobody));

        let mut occupied = create_test_lobby(0);
        occupied.add_member(member(1, "ana"), nobody, t0());
        assert!(!occupied.is_idle(t0() + Duration::hours(1), timeout, |_| true));
    }

    #[test]
    fn test_listing_field() {
        let mut lobby = create_test_lobby(0);
        lobby.add_member(member(1, "ana"), nobody, t0());
        let field = lobby.listing_field();
        assert_eq!(field.name, "Halo");
        assert!(field.value.contains("Players: ana"));
        assert!(field.value.contains("Channel: <#10>"));
        assert!(field.value.ends_with("ID: 3"));
    }

    #[test]
    fn test_expiry_message() {
        let lobby = create_test_lobby(0);
        assert_eq!(
            lobby.expiry_message(Duration::seconds(300)),
            "Lobby 3 (Halo) closed after 5 minutes of voice inactivity."
        );
    }
}
