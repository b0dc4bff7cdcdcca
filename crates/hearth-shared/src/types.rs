use serde::{Deserialize, Serialize};

use crate::constants::MEDIA_KEY_HEX_LEN;
use crate::error::IdError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Build an identifier, rejecting the empty string.
            pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
                let s = s.into();
                if s.is_empty() {
                    return Err(IdError::Empty);
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Conversation (room) identifier as issued by the remote chat service.
    RoomId
);

string_id!(
    /// Timeline event identifier, unique across all rooms.
    EventId
);

string_id!(
    /// Member / user identifier.
    UserId
);

// Media is addressed by the BLAKE3 digest of its bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MediaKey(String);

impl MediaKey {
    /// Derive the key for a payload.
    pub fn from_content(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Parse a hex-encoded digest, normalising to lowercase.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.len() != MEDIA_KEY_HEX_LEN {
            return Err(IdError::MediaKeyLength {
                expected: MEDIA_KEY_HEX_LEN,
                got: s.len(),
            });
        }
        hex::decode(s)?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Wrap a key read back from storage without re-validating it.
    pub fn from_stored(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl std::fmt::Display for MediaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_rejected() {
        assert_eq!(RoomId::parse(""), Err(IdError::Empty));
        assert_eq!(UserId::parse("@alice:example.org").unwrap().as_str(), "@alice:example.org");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = EventId::from("$abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"$abc\"");
        let back: EventId = serde_json::from_str("\"$abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn media_key_is_content_derived() {
        let a = MediaKey::from_content(b"avatar bytes");
        let b = MediaKey::from_content(b"avatar bytes");
        let c = MediaKey::from_content(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), MEDIA_KEY_HEX_LEN);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn media_key_parse() {
        let key = MediaKey::from_content(b"x");
        let upper = key.as_str().to_ascii_uppercase();
        assert_eq!(MediaKey::parse(&upper).unwrap(), key);
        assert!(matches!(
            MediaKey::parse("abcd"),
            Err(IdError::MediaKeyLength { got: 4, .. })
        ));
        assert!(matches!(
            MediaKey::parse(&"zz".repeat(32)),
            Err(IdError::MediaKeyHex(_))
        ));
    }

    #[test]
    fn short_respects_char_boundaries() {
        let key: MediaKey = serde_json::from_str("\"aéééééééééé\"").unwrap();
        assert_eq!(key.short(), "aééééééé");
        assert_eq!(MediaKey::from_stored("ab".into()).short(), "ab");
    }
}
