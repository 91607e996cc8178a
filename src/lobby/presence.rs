//! Voice presence table
//!
//! Tracks which voice channel each member currently sits in, fed by voice
//! state events and seeded from the guild snapshot on connect.

use crate::error::{LobbyError, Result};
use crate::types::{ChannelRef, MemberId, VoiceChannelInfo, VoiceChannelOccupancy, VoiceStateChange};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct VoicePresence {
    members: RwLock<HashMap<MemberId, ChannelRef>>,
}

impl VoicePresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole table with a fresh guild snapshot
    pub fn seed(&self, states: impl IntoIterator<Item = (MemberId, ChannelRef)>) -> Result<()> {
        let mut members = self
            .members
            .write()
            .map_err(|_| LobbyError::lock_poisoned("presence"))?;
        members.clear();
        members.extend(states);
        Ok(())
    }

    /// Record a voice state change; returns whether presence flipped for the member
    pub fn apply(&self, change: &VoiceStateChange) -> Result<bool> {
        let mut members = self
            .members
            .write()
            .map_err(|_| LobbyError::lock_poisoned("presence"))?;

        let was_present = members.contains_key(&change.member_id);
        match change.new_channel {
            Some(channel) => {
                members.insert(change.member_id, channel);
            }
            None => {
                members.remove(&change.member_id);
            }
        }
        Ok(was_present != change.new_channel.is_some())
    }

    pub fn channel_of(&self, member: MemberId) -> Result<Option<ChannelRef>> {
        let members = self
            .members
            .read()
            .map_err(|_| LobbyError::lock_poisoned("presence"))?;
        Ok(members.get(&member).copied())
    }

    pub fn is_present(&self, member: MemberId) -> Result<bool> {
        Ok(self.channel_of(member)?.is_some())
    }

    /// Copy of the table for evaluating many lobbies without holding the lock
    pub fn snapshot(&self) -> Result<HashMap<MemberId, ChannelRef>> {
        let members = self
            .members
            .read()
            .map_err(|_| LobbyError::lock_poisoned("presence"))?;
        Ok(members.clone())
    }

    /// Member counts for the given channels, preserving their order
    pub fn occupancy(&self, channels: &[VoiceChannelInfo]) -> Result<Vec<VoiceChannelOccupancy>> {
        let members = self
            .members
            .read()
            .map_err(|_| LobbyError::lock_poisoned("presence"))?;

        Ok(channels
            .iter()
            .map(|channel| VoiceChannelOccupancy {
                channel: channel.clone(),
                member_count: members.values().filter(|c| **c == channel.id).count(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(member: u64, from: Option<u64>, to: Option<u64>) -> VoiceStateChange {
        VoiceStateChange {
            member_id: MemberId(member),
            previous_channel: from.map(ChannelRef),
            new_channel: to.map(ChannelRef),
        }
    }

    #[test]
    fn test_join_move_leave() {
        let presence = VoicePresence::new();

        assert!(presence.apply(&change(1, None, Some(100))).unwrap());
        assert_eq!(presence.channel_of(MemberId(1)).unwrap(), Some(ChannelRef(100)));

        // Moving between channels is not a presence flip
        assert!(!presence.apply(&change(1, Some(100), Some(200))).unwrap());
        assert_eq!(presence.channel_of(MemberId(1)).unwrap(), Some(ChannelRef(200)));

        assert!(presence.apply(&change(1, Some(200), None)).unwrap());
        assert!(!presence.is_present(MemberId(1)).unwrap());
    }

    #[test]
    fn test_seed_replaces_table() {
        let presence = VoicePresence::new();
        presence.apply(&change(9, None, Some(1))).unwrap();
        presence
            .seed(vec![(MemberId(1), ChannelRef(100)), (MemberId(2), ChannelRef(100))])
            .unwrap();

        assert!(!presence.is_present(MemberId(9)).unwrap());
        assert_eq!(presence.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_occupancy_counts() {
        let presence = VoicePresence::new();
        presence
            .seed(vec![
                (MemberId(1), ChannelRef(100)),
                (MemberId(2), ChannelRef(100)),
                (MemberId(3), ChannelRef(300)),
            ])
            .unwrap();

        let channels = vec![
            VoiceChannelInfo {
                id: ChannelRef(100),
                name: "General".to_string(),
                position: 0,
            },
            VoiceChannelInfo {
                id: ChannelRef(200),
                name: "Squad".to_string(),
                position: 1,
            },
        ];
        let counts: Vec<usize> = presence
            .occupancy(&channels)
            .unwrap()
            .iter()
            .map(|o| o.member_count)
            .collect();
        assert_eq!(counts, vec![2, 0]);
    }
}
