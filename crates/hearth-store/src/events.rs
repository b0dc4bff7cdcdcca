//! Per-room ordered event log.
//!
//! Events are keyed by id; `idx_events_room_ts(room_id, ts, id)` orders them
//! per room so that backward range scans and per-room deletes never touch
//! other rooms' rows.

use std::sync::Arc;

use hearth_shared::{EventId, RoomId, UserId};
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::models::Event;
use crate::store::{Collection, Store, TxMode};

const EVENT_COLUMNS: &str = "id, room_id, sender, ts, content";

pub struct EventCollection {
    store: Arc<Store>,
}

impl EventCollection {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Upsert events by id in one transaction. Re-delivering an event
    /// overwrites the stored copy.
    pub async fn put_events(&self, events: Vec<Event>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let count = events.len();
        self.store
            .run_transaction(&[Collection::Events], TxMode::ReadWrite, move |tx| {
                let mut stmt = tx.prepare(
                    "INSERT INTO events (id, room_id, sender, ts, content)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                         room_id = excluded.room_id,
                         sender = excluded.sender,
                         ts = excluded.ts,
                         content = excluded.content",
                )?;
                for event in &events {
                    stmt.execute(params![
                        event.id.as_str(),
                        event.room_id.as_str(),
                        event.sender.as_str(),
                        event.ts,
                        serde_json::to_string(&event.content)?,
                    ])?;
                }
                Ok(())
            })
            .await?;

        debug!(count, "stored events");
        Ok(())
    }

    /// At most `limit` events of `room_id` with `ts < before` (all events if
    /// `before` is `None`), newest first.
    ///
    /// Feeding the oldest returned timestamp back in as `before` walks the
    /// whole local history. Events sharing a timestamp come back in
    /// descending id order; a page boundary that falls inside such a run
    /// skips the rest of the run, since `before` is exclusive.
    pub async fn get_events_by_conversation(
        &self,
        room_id: &RoomId,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<Event>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let room_id = room_id.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.store
            .run_transaction(&[Collection::Events], TxMode::ReadOnly, move |tx| {
                let mut stmt = tx.prepare(&scan_sql(before.is_some()))?;
                let rows = stmt.query_map(
                    params![room_id.as_str(), before.unwrap_or_default(), limit],
                    row_to_event,
                )?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn get_event(&self, id: &EventId) -> Result<Option<Event>> {
        let id = id.clone();
        self.store
            .run_transaction(&[Collection::Events], TxMode::ReadOnly, move |tx| {
                Ok(tx
                    .query_row(
                        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                        params![id.as_str()],
                        row_to_event,
                    )
                    .optional()?)
            })
            .await
    }

    /// Newest event of a room, e.g. for a room list preview.
    pub async fn latest_event(&self, room_id: &RoomId) -> Result<Option<Event>> {
        Ok(self
            .get_events_by_conversation(room_id, 1, None)
            .await?
            .into_iter()
            .next())
    }

    pub async fn count_events(&self, room_id: &RoomId) -> Result<usize> {
        let room_id = room_id.clone();
        self.store
            .run_transaction(&[Collection::Events], TxMode::ReadOnly, move |tx| {
                let count: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM events WHERE room_id = ?1",
                    params![room_id.as_str()],
                    |r| r.get(0),
                )?;
                usize::try_from(count)
                    .map_err(|_| StoreError::Corrupt(format!("negative event count {count}")))
            })
            .await
    }

    /// Remove every event of a room. Returns the number deleted.
    pub async fn delete_events_by_conversation(&self, room_id: &RoomId) -> Result<usize> {
        let room = room_id.clone();
        let deleted = self
            .store
            .run_transaction(&[Collection::Events], TxMode::ReadWrite, move |tx| {
                delete_for_room(tx, &room)
            })
            .await?;

        debug!(room = %room_id, deleted, "deleted room events");
        Ok(deleted)
    }
}

/// Backward scan over `idx_events_room_ts`. Parameters: `?1` room, `?2`
/// exclusive upper timestamp (ignored when unbounded), `?3` limit.
fn scan_sql(bounded: bool) -> String {
    let filter = if bounded { "AND ts < ?2" } else { "" };
    format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE room_id = ?1 {filter}
         ORDER BY ts DESC, id DESC
         LIMIT ?3"
    )
}

pub(crate) fn delete_for_room(tx: &Transaction<'_>, room_id: &RoomId) -> Result<usize> {
    Ok(tx.execute(
        "DELETE FROM events WHERE room_id = ?1",
        params![room_id.as_str()],
    )?)
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let id: String = row.get(0)?;
    let room_id: String = row.get(1)?;
    let sender: String = row.get(2)?;
    let ts: i64 = row.get(3)?;
    let content_str: String = row.get(4)?;

    let content = serde_json::from_str(&content_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Event {
        id: EventId::from(id),
        room_id: RoomId::from(room_id),
        sender: UserId::from(sender),
        ts,
        content,
    })
}
