//! # hearth-shared
//!
//! Identifier types and constants shared by every Hearth crate.

pub mod constants;
pub mod error;
pub mod types;

pub use error::IdError;
pub use types::{EventId, MediaKey, RoomId, UserId};
