//! Per-room roster snapshots.
//!
//! A roster is always replaced wholesale: the old rows of the room and the
//! new roster are swapped inside one immediate transaction, so readers see
//! either the complete old roster or the complete new one.

use std::sync::Arc;

use hearth_shared::{RoomId, UserId};
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::debug;

use crate::error::Result;
use crate::models::{Member, Membership};
use crate::store::{Collection, Store, TxMode};

const MEMBER_COLUMNS: &str = "room_id, user_id, display_name, avatar, membership";

pub struct MemberCollection {
    store: Arc<Store>,
}

impl MemberCollection {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Replace the roster of `room_id` with `members`.
    ///
    /// Entries carrying a different `room_id` are stored under `room_id`.
    /// A user listed twice keeps the last entry.
    pub async fn replace_conversation_members(
        &self,
        room_id: &RoomId,
        members: Vec<Member>,
    ) -> Result<()> {
        let room = room_id.clone();
        let (removed, inserted) = self
            .store
            .run_transaction(&[Collection::Members], TxMode::ReadWrite, move |tx| {
                let removed = delete_for_room(tx, &room)?;

                let mut stmt = tx.prepare(
                    "INSERT INTO members (room_id, user_id, display_name, avatar, membership)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(room_id, user_id) DO UPDATE SET
                         display_name = excluded.display_name,
                         avatar = excluded.avatar,
                         membership = excluded.membership",
                )?;
                for member in &members {
                    stmt.execute(params![
                        room.as_str(),
                        member.user_id.as_str(),
                        member.display_name,
                        member.avatar,
                        member.membership.as_str(),
                    ])?;
                }
                Ok((removed, members.len()))
            })
            .await?;

        debug!(room = %room_id, removed, inserted, "replaced room roster");
        Ok(())
    }

    /// Current roster of a room, ordered by user id.
    pub async fn get_conversation_members(&self, room_id: &RoomId) -> Result<Vec<Member>> {
        let room = room_id.clone();
        self.store
            .run_transaction(&[Collection::Members], TxMode::ReadOnly, move |tx| {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {MEMBER_COLUMNS} FROM members WHERE room_id = ?1 ORDER BY user_id ASC"
                ))?;
                let rows = stmt.query_map(params![room.as_str()], row_to_member)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn get_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<Member>> {
        let room = room_id.clone();
        let user = user_id.clone();
        self.store
            .run_transaction(&[Collection::Members], TxMode::ReadOnly, move |tx| {
                Ok(tx
                    .query_row(
                        &format!(
                            "SELECT {MEMBER_COLUMNS} FROM members WHERE room_id = ?1 AND user_id = ?2"
                        ),
                        params![room.as_str(), user.as_str()],
                        row_to_member,
                    )
                    .optional()?)
            })
            .await
    }

    /// Drop the roster of a room. Returns the number of rows removed.
    pub async fn delete_conversation_members(&self, room_id: &RoomId) -> Result<usize> {
        let room = room_id.clone();
        self.store
            .run_transaction(&[Collection::Members], TxMode::ReadWrite, move |tx| {
                delete_for_room(tx, &room)
            })
            .await
    }
}

pub(crate) fn delete_for_room(tx: &Transaction<'_>, room_id: &RoomId) -> Result<usize> {
    Ok(tx.execute(
        "DELETE FROM members WHERE room_id = ?1",
        params![room_id.as_str()],
    )?)
}

fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<Member> {
    let room_id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let membership_str: String = row.get(4)?;

    let membership = membership_str.parse::<Membership>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(Member {
        room_id: RoomId::from(room_id),
        user_id: UserId::from(user_id),
        display_name: row.get(2)?,
        avatar: row.get(3)?,
        membership,
    })
}
