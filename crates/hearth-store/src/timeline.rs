//! The [`TimelineCache`] facade handed to the sync and UI layers.
//!
//! It owns the store and one instance of every collection. Operations that
//! span several collections (leaving or resetting a room) live here so they
//! can run in a single transaction.

use std::sync::Arc;

use hearth_shared::RoomId;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::events::{self, EventCollection};
use crate::media::MediaCollection;
use crate::members::{self, MemberCollection};
use crate::meta::MetaCollection;
use crate::rooms::{self, RoomCollection};
use crate::store::{Collection, Store, TxMode};
use crate::tokens::{self, TokenCollection};
use crate::users::UserCollection;

pub struct TimelineCache {
    store: Arc<Store>,
    rooms: RoomCollection,
    users: UserCollection,
    events: EventCollection,
    members: MemberCollection,
    media: MediaCollection,
    tokens: TokenCollection,
    meta: MetaCollection,
}

/// What [`TimelineCache::leave_room`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaveSummary {
    pub room_removed: bool,
    pub events_removed: usize,
    pub members_removed: usize,
    pub token_removed: bool,
}

impl TimelineCache {
    /// Build the cache on top of an existing store. Nothing is opened until
    /// the first operation (or an explicit [`TimelineCache::initialize`]).
    pub fn new(store: Arc<Store>, config: &CacheConfig) -> Self {
        Self {
            rooms: RoomCollection::new(store.clone(), config.room_cache_capacity),
            users: UserCollection::new(store.clone(), config.profile_cache_capacity),
            events: EventCollection::new(store.clone()),
            members: MemberCollection::new(store.clone()),
            media: MediaCollection::new(store.clone(), config.media_budget.clone()),
            tokens: TokenCollection::new(store.clone()),
            meta: MetaCollection::new(store.clone()),
            store,
        }
    }

    /// Resolve the database path from `config`, open it and run migrations.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let path = config.resolve_db_path()?;
        let cache = Self::new(Arc::new(Store::new(path)), config);
        cache.initialize().await?;
        info!(?config, "timeline cache ready");
        Ok(cache)
    }

    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize().await
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn rooms(&self) -> &RoomCollection {
        &self.rooms
    }

    pub fn users(&self) -> &UserCollection {
        &self.users
    }

    pub fn events(&self) -> &EventCollection {
        &self.events
    }

    pub fn members(&self) -> &MemberCollection {
        &self.members
    }

    pub fn media(&self) -> &MediaCollection {
        &self.media
    }

    pub fn tokens(&self) -> &TokenCollection {
        &self.tokens
    }

    pub fn meta(&self) -> &MetaCollection {
        &self.meta
    }

    /// Remove a room together with its events, roster and pagination token.
    pub async fn leave_room(&self, room_id: &RoomId) -> Result<LeaveSummary> {
        let room = room_id.clone();
        let summary = self
            .store
            .run_transaction(
                &[
                    Collection::Rooms,
                    Collection::Events,
                    Collection::Members,
                    Collection::Tokens,
                ],
                TxMode::ReadWrite,
                move |tx| {
                    Ok(LeaveSummary {
                        room_removed: rooms::delete_room(tx, &room)?,
                        events_removed: events::delete_for_room(tx, &room)?,
                        members_removed: members::delete_for_room(tx, &room)?,
                        token_removed: tokens::delete_for_room(tx, &room)?,
                    })
                },
            )
            .await?;

        self.rooms.evict(room_id).await;
        info!(room = %room_id, ?summary, "left room");
        Ok(summary)
    }

    /// Drop a room's local history and pagination state so it is fetched
    /// again from scratch. The room and its roster are kept.
    pub async fn reset_conversation(&self, room_id: &RoomId) -> Result<usize> {
        let room = room_id.clone();
        let events_removed = self
            .store
            .run_transaction(
                &[Collection::Events, Collection::Tokens],
                TxMode::ReadWrite,
                move |tx| {
                    let removed = events::delete_for_room(tx, &room)?;
                    tokens::delete_for_room(tx, &room)?;
                    Ok(removed)
                },
            )
            .await?;

        info!(room = %room_id, events_removed, "reset room history");
        Ok(events_removed)
    }
}

#[cfg(test)]
mod tests {
    use hearth_shared::{EventId, UserId};
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Event, Member, Membership, MediaRecord, PaginationToken, Room, UserProfile};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn config(dir: &tempfile::TempDir) -> CacheConfig {
        CacheConfig {
            db_path: Some(dir.path().join("timeline.db")),
            ..CacheConfig::default()
        }
    }

    fn event(id: &str, room: &str, ts: i64) -> Event {
        Event {
            id: EventId::from(id),
            room_id: RoomId::from(room),
            sender: UserId::from("@alice"),
            ts,
            content: json!({ "msgtype": "m.text", "body": id }),
        }
    }

    async fn populate(cache: &TimelineCache, room: &str) {
        cache
            .rooms()
            .put_rooms(vec![Room {
                id: RoomId::from(room),
                name: "General".into(),
                last_activity: 300,
                avatar: None,
                unread: 1,
            }])
            .await
            .unwrap();
        cache
            .events()
            .put_events(vec![
                event(&format!("{room}/e1"), room, 100),
                event(&format!("{room}/e2"), room, 200),
            ])
            .await
            .unwrap();
        cache
            .members()
            .replace_conversation_members(
                &RoomId::from(room),
                vec![Member {
                    room_id: RoomId::from(room),
                    user_id: UserId::from("@alice"),
                    display_name: Some("Alice".into()),
                    avatar: None,
                    membership: Membership::Joined,
                }],
            )
            .await
            .unwrap();
        cache
            .tokens()
            .set_backward_token(&RoomId::from(room), Some("t0".into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let room = RoomId::from("!general");

        {
            let cache = TimelineCache::open(&config(&dir)).await.unwrap();
            populate(&cache, "!general").await;
            cache
                .users()
                .put(UserProfile {
                    user_id: UserId::from("@alice"),
                    display_name: Some("Alice".into()),
                    avatar: None,
                })
                .await
                .unwrap();
        }

        let cache = TimelineCache::open(&config(&dir)).await.unwrap();
        let page = cache
            .events()
            .get_events_by_conversation(&room, 50, None)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(cache.members().get_conversation_members(&room).await.unwrap().len(), 1);
        assert!(cache.users().get_user(&UserId::from("@alice")).await.unwrap().is_some());
        assert_eq!(
            cache.tokens().get_backward_token(&room).await.unwrap(),
            Some(PaginationToken::Cursor("t0".into()))
        );
    }

    #[tokio::test]
    async fn leave_room_removes_everything_for_the_room() {
        init_tracing();
        let cache = TimelineCache::new(Arc::new(Store::in_memory()), &CacheConfig::default());
        populate(&cache, "!gone").await;
        populate(&cache, "!kept").await;
        let gone = RoomId::from("!gone");

        // Warm the room cache so eviction is observable.
        assert!(cache.rooms().get_room(&gone).await.unwrap().is_some());

        let summary = cache.leave_room(&gone).await.unwrap();
        assert_eq!(
            summary,
            LeaveSummary {
                room_removed: true,
                events_removed: 2,
                members_removed: 1,
                token_removed: true,
            }
        );

        assert!(!cache.rooms().is_cached(&gone).await);
        assert!(cache.rooms().get_room(&gone).await.unwrap().is_none());
        assert_eq!(cache.events().count_events(&gone).await.unwrap(), 0);
        assert!(cache.members().get_conversation_members(&gone).await.unwrap().is_empty());
        assert_eq!(cache.tokens().get_backward_token(&gone).await.unwrap(), None);

        let kept = RoomId::from("!kept");
        assert!(cache.rooms().get_room(&kept).await.unwrap().is_some());
        assert_eq!(cache.events().count_events(&kept).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reset_keeps_room_and_roster() {
        let cache = TimelineCache::new(Arc::new(Store::in_memory()), &CacheConfig::default());
        populate(&cache, "!r").await;
        let room = RoomId::from("!r");

        assert_eq!(cache.reset_conversation(&room).await.unwrap(), 2);
        assert_eq!(cache.events().count_events(&room).await.unwrap(), 0);
        assert_eq!(cache.tokens().get_backward_token(&room).await.unwrap(), None);
        assert!(cache.rooms().get_room(&room).await.unwrap().is_some());
        assert_eq!(cache.members().get_conversation_members(&room).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_collection() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let cfg = CacheConfig {
            db_path: Some(blocker.join("timeline.db")),
            ..CacheConfig::default()
        };

        assert!(matches!(
            TimelineCache::open(&cfg).await,
            Err(e) if e.is_unavailable()
        ));

        let cache = TimelineCache::new(Arc::new(Store::new(blocker.join("timeline.db"))), &cfg);
        let room = RoomId::from("!r");
        let kinds = [
            cache.events().get_events_by_conversation(&room, 10, None).await.unwrap_err().kind(),
            cache.users().get_user(&UserId::from("@a")).await.unwrap_err().kind(),
            cache.members().get_conversation_members(&room).await.unwrap_err().kind(),
            cache.tokens().get_backward_token(&room).await.unwrap_err().kind(),
            cache.meta().get_meta::<u32>("k").await.unwrap_err().kind(),
            cache
                .media()
                .put_media(MediaRecord::from_content(200, "text/plain", b"x".to_vec()))
                .await
                .unwrap_err()
                .kind(),
        ];
        assert!(kinds.iter().all(|k| *k == ErrorKind::StorageUnavailable));
    }

    #[tokio::test]
    async fn sync_then_render_flow() {
        let cache = TimelineCache::new(Arc::new(Store::in_memory()), &CacheConfig::default());
        let room = RoomId::from("!r");

        // Sync layer: decide what to fetch, then persist what arrived.
        assert_eq!(cache.tokens().get_backward_token(&room).await.unwrap(), None);
        cache
            .events()
            .put_events((1..=5).map(|i| event(&format!("e{i}"), "!r", i * 100)).collect())
            .await
            .unwrap();
        cache.tokens().set_backward_token(&room, None).await.unwrap();

        // UI layer: page through newest first.
        let first = cache
            .events()
            .get_events_by_conversation(&room, 3, None)
            .await
            .unwrap();
        let oldest = first.last().map(|e| e.ts);
        let second = cache
            .events()
            .get_events_by_conversation(&room, 3, oldest)
            .await
            .unwrap();
        let ids: Vec<&str> = first.iter().chain(&second).map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e5", "e4", "e3", "e2", "e1"]);
        assert_eq!(
            cache.tokens().get_backward_token(&room).await.unwrap(),
            Some(PaginationToken::Exhausted)
        );
    }
}
