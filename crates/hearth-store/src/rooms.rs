//! Rooms (conversations), served through the LRU-backed [`CachedCollection`].

use hearth_shared::RoomId;
use rusqlite::{params, OptionalExtension, Transaction};

use crate::cached::{CachedCollection, CachedRecord};
use crate::error::Result;
use crate::models::Room;
use crate::store::{Collection, TxMode};

pub type RoomCollection = CachedCollection<Room>;

const ROOM_COLUMNS: &str = "id, name, last_activity, avatar, unread";

impl CachedRecord for Room {
    type Key = RoomId;

    const COLLECTION: Collection = Collection::Rooms;

    fn key(&self) -> RoomId {
        self.id.clone()
    }

    fn upsert(tx: &Transaction<'_>, value: &Self) -> Result<()> {
        tx.execute(
            "INSERT INTO rooms (id, name, last_activity, avatar, unread)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 last_activity = excluded.last_activity,
                 avatar = excluded.avatar,
                 unread = excluded.unread",
            params![
                value.id.as_str(),
                value.name,
                value.last_activity,
                value.avatar,
                value.unread,
            ],
        )?;
        Ok(())
    }

    fn select(tx: &Transaction<'_>, key: &RoomId) -> Result<Option<Self>> {
        Ok(tx
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
                params![key.as_str()],
                row_to_room,
            )
            .optional()?)
    }

    fn select_all(tx: &Transaction<'_>) -> Result<Vec<Self>> {
        let mut stmt = tx.prepare(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms ORDER BY last_activity DESC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_room)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    fn delete(tx: &Transaction<'_>, key: &RoomId) -> Result<bool> {
        delete_room(tx, key)
    }
}

impl CachedCollection<Room> {
    pub async fn get_room(&self, id: &RoomId) -> Result<Option<Room>> {
        self.get(id).await
    }

    /// Upsert every room observed by the sync layer.
    pub async fn put_rooms(&self, rooms: Vec<Room>) -> Result<()> {
        self.put_many(rooms).await
    }

    /// The `limit` most recently active rooms, newest first.
    pub async fn list_rooms(&self, limit: usize) -> Result<Vec<Room>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.store()
            .run_transaction(&[Collection::Rooms], TxMode::ReadOnly, move |tx| {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {ROOM_COLUMNS} FROM rooms
                     ORDER BY last_activity DESC, id ASC
                     LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![limit], row_to_room)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }
}

pub(crate) fn delete_room(tx: &Transaction<'_>, id: &RoomId) -> Result<bool> {
    let affected = tx.execute("DELETE FROM rooms WHERE id = ?1", params![id.as_str()])?;
    Ok(affected > 0)
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    let id: String = row.get(0)?;
    Ok(Room {
        id: RoomId::from(id),
        name: row.get(1)?,
        last_activity: row.get(2)?,
        avatar: row.get(3)?,
        unread: row.get(4)?,
    })
}
