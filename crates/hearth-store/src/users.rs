//! User profiles, served through the LRU-backed [`CachedCollection`].

use hearth_shared::UserId;
use rusqlite::{params, OptionalExtension, Transaction};

use crate::cached::{CachedCollection, CachedRecord};
use crate::error::Result;
use crate::models::UserProfile;
use crate::store::Collection;

pub type UserCollection = CachedCollection<UserProfile>;

impl CachedRecord for UserProfile {
    type Key = UserId;

    const COLLECTION: Collection = Collection::Users;

    fn key(&self) -> UserId {
        self.user_id.clone()
    }

    fn upsert(tx: &Transaction<'_>, value: &Self) -> Result<()> {
        tx.execute(
            "INSERT INTO users (user_id, display_name, avatar)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 avatar = excluded.avatar",
            params![value.user_id.as_str(), value.display_name, value.avatar],
        )?;
        Ok(())
    }

    fn select(tx: &Transaction<'_>, key: &UserId) -> Result<Option<Self>> {
        Ok(tx
            .query_row(
                "SELECT user_id, display_name, avatar FROM users WHERE user_id = ?1",
                params![key.as_str()],
                row_to_profile,
            )
            .optional()?)
    }

    fn select_all(tx: &Transaction<'_>) -> Result<Vec<Self>> {
        let mut stmt =
            tx.prepare("SELECT user_id, display_name, avatar FROM users ORDER BY user_id ASC")?;
        let rows = stmt.query_map([], row_to_profile)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    fn delete(tx: &Transaction<'_>, key: &UserId) -> Result<bool> {
        let affected = tx.execute("DELETE FROM users WHERE user_id = ?1", params![key.as_str()])?;
        Ok(affected > 0)
    }
}

impl CachedCollection<UserProfile> {
    /// Profile lookup used when rendering an event's sender.
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        self.get(user_id).await
    }

    pub async fn put_users(&self, profiles: Vec<UserProfile>) -> Result<()> {
        self.put_many(profiles).await
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let user_id: String = row.get(0)?;
    Ok(UserProfile {
        user_id: UserId::from(user_id),
        display_name: row.get(1)?,
        avatar: row.get(2)?,
    })
}
