//! # hearth-store
//!
//! Local timeline cache for the Hearth client, backed by SQLite.
//!
//! The cache mirrors the remote chat timeline (rooms, ordered events,
//! membership, user profiles, media and pagination cursors) so the UI can
//! render from local state while the sync layer keeps it current. A single
//! [`Store`] owns the connection; every collection receives it at
//! construction time, and [`TimelineCache`] bundles them together.

pub mod cached;
pub mod config;
pub mod events;
pub mod lru;
pub mod media;
pub mod members;
pub mod meta;
pub mod migrations;
pub mod models;
pub mod rooms;
pub mod store;
pub mod timeline;
pub mod tokens;
pub mod users;

mod error;

pub use cached::{CachedCollection, CachedRecord};
pub use config::{CacheConfig, MediaBudget};
pub use error::{ErrorKind, Result, StoreError};
pub use events::EventCollection;
pub use media::MediaCollection;
pub use members::MemberCollection;
pub use meta::MetaCollection;
pub use models::*;
pub use rooms::RoomCollection;
pub use store::{Collection, Store, TxMode};
pub use timeline::{LeaveSummary, TimelineCache};
pub use tokens::TokenCollection;
pub use users::UserCollection;
