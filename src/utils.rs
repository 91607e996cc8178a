//! Utility functions for the lobby bot

use crate::types::{ChannelRef, MemberId};
use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Mention markup for a member
pub fn mention_member(id: MemberId) -> String {
    format!("<@{}>", id)
}

/// Mention markup for a channel
pub fn mention_channel(id: ChannelRef) -> String {
    format!("<#{}>", id)
}

/// Whether a token reads as a finite number
pub fn is_number(token: &str) -> bool {
    token.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
}
