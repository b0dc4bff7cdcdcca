//! Domain model structs persisted in the timeline cache.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the UI layer.

use std::fmt;
use std::str::FromStr;

use hearth_shared::{EventId, MediaKey, RoomId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A conversation the user takes part in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    /// Human-readable room name.
    pub name: String,
    /// Timestamp (ms) of the most recent activity, used to order the room list.
    pub last_activity: i64,
    /// Optional avatar reference (media key or remote URI).
    pub avatar: Option<String>,
    /// Number of unread events.
    pub unread: u32,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single timeline entry. The content is opaque to the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub room_id: RoomId,
    pub sender: UserId,
    /// Origin timestamp in ms, monotonic per room as reported by the server.
    pub ts: i64,
    pub content: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Joined,
    Left,
    Invited,
}

impl Membership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::Joined => "joined",
            Membership::Left => "left",
            Membership::Invited => "invited",
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Membership {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joined" => Ok(Membership::Joined),
            "left" => Ok(Membership::Left),
            "invited" => Ok(Membership::Invited),
            other => Err(format!("unknown membership state: {other}")),
        }
    }
}

/// One entry of a room roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub membership: Membership,
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

/// Global (not per-room) profile of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// A cached binary payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRecord {
    pub key: MediaKey,
    /// Status code of the fetch that produced the payload.
    pub status: u16,
    /// Last write time in ms. Stamped by the media collection.
    pub ts: i64,
    /// Payload length in bytes. Set from `data` on write.
    pub size: u64,
    pub mime: String,
    pub data: Vec<u8>,
}

impl MediaRecord {
    /// A fresh record keyed by its content.
    pub fn from_content(status: u16, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            key: MediaKey::from_content(&data),
            status,
            ts: 0,
            size: data.len() as u64,
            mime: mime.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination token
// ---------------------------------------------------------------------------

/// State of backward pagination for a room. A room that has never been
/// paginated has no token at all (`None` from the token collection).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaginationToken {
    /// Opaque cursor to continue from.
    Cursor(String),
    /// The remote reported no more history.
    Exhausted,
}

impl PaginationToken {
    pub fn cursor(&self) -> Option<&str> {
        match self {
            PaginationToken::Cursor(c) => Some(c),
            PaginationToken::Exhausted => None,
        }
    }
}

impl From<Option<String>> for PaginationToken {
    fn from(token: Option<String>) -> Self {
        match token {
            Some(c) => PaginationToken::Cursor(c),
            None => PaginationToken::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_text_form() {
        for m in [Membership::Joined, Membership::Left, Membership::Invited] {
            assert_eq!(m.as_str().parse::<Membership>().unwrap(), m);
            assert_eq!(serde_json::to_string(&m).unwrap(), format!("\"{m}\""));
        }
        assert!("banned".parse::<Membership>().is_err());
    }

    #[test]
    fn media_record_from_content() {
        let rec = MediaRecord::from_content(200, "image/png", b"png".to_vec());
        assert_eq!(rec.key, MediaKey::from_content(b"png"));
        assert_eq!(rec.size, 3);
    }
}
