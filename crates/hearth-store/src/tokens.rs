//! Backward pagination tokens, one per room.
//!
//! A row with a NULL token means the remote has no more history; no row at
//! all means the room was never paginated.

use std::sync::Arc;

use hearth_shared::RoomId;
use rusqlite::{params, OptionalExtension, Transaction};

use crate::error::Result;
use crate::models::PaginationToken;
use crate::store::{Collection, Store, TxMode};

pub struct TokenCollection {
    store: Arc<Store>,
}

impl TokenCollection {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Record the cursor returned by the last backward fetch. `None` marks
    /// the room's history as exhausted.
    pub async fn set_backward_token(&self, room_id: &RoomId, token: Option<String>) -> Result<()> {
        let room = room_id.clone();
        self.store
            .run_transaction(&[Collection::Tokens], TxMode::ReadWrite, move |tx| {
                tx.execute(
                    "INSERT INTO tokens (room_id, token) VALUES (?1, ?2)
                     ON CONFLICT(room_id) DO UPDATE SET token = excluded.token",
                    params![room.as_str(), token],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_backward_token(&self, room_id: &RoomId) -> Result<Option<PaginationToken>> {
        let room = room_id.clone();
        self.store
            .run_transaction(&[Collection::Tokens], TxMode::ReadOnly, move |tx| {
                let row: Option<Option<String>> = tx
                    .query_row(
                        "SELECT token FROM tokens WHERE room_id = ?1",
                        params![room.as_str()],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(row.map(PaginationToken::from))
            })
            .await
    }

    /// Forget pagination state. Returns `true` if a token was stored.
    pub async fn delete_token(&self, room_id: &RoomId) -> Result<bool> {
        let room = room_id.clone();
        self.store
            .run_transaction(&[Collection::Tokens], TxMode::ReadWrite, move |tx| {
                delete_for_room(tx, &room)
            })
            .await
    }
}

pub(crate) fn delete_for_room(tx: &Transaction<'_>, room_id: &RoomId) -> Result<bool> {
    let affected = tx.execute(
        "DELETE FROM tokens WHERE room_id = ?1",
        params![room_id.as_str()],
    )?;
    Ok(affected > 0)
}
