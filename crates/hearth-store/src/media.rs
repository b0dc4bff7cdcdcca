//! Content-addressed media cache with a retention budget.
//!
//! Recency is write recency: `put_media` stamps `ts`, `get_media` leaves it
//! alone, so pruning removes the records written longest ago.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use hearth_shared::MediaKey;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use crate::config::MediaBudget;
use crate::error::{Result, StoreError};
use crate::models::MediaRecord;
use crate::store::{Collection, Store, TxMode};

pub struct MediaCollection {
    store: Arc<Store>,
    budget: MediaBudget,
    last_stamp: AtomicI64,
}

impl MediaCollection {
    pub fn new(store: Arc<Store>, budget: MediaBudget) -> Self {
        Self {
            store,
            budget,
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn budget(&self) -> &MediaBudget {
        &self.budget
    }

    /// Upsert a record, stamping its write time and size.
    ///
    /// The stamp is later than every stamp already stored, even if the wall
    /// clock went backwards or another collection shares the store. With a
    /// budget configured the write is followed by a prune. A failed prune is
    /// logged and does not fail the write.
    pub async fn put_media(&self, mut record: MediaRecord) -> Result<MediaRecord> {
        record.size = record.data.len() as u64;

        let now = self.next_stamp();
        let stored = record.clone();
        record.ts = self
            .store
            .run_transaction(&[Collection::Media], TxMode::ReadWrite, move |tx| {
                let newest: Option<i64> =
                    tx.query_row("SELECT MAX(ts) FROM media", [], |r| r.get(0))?;
                let ts = newest.map_or(now, |newest| now.max(newest.saturating_add(1)));
                tx.execute(
                    "INSERT INTO media (key, status, ts, size, mime, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(key) DO UPDATE SET
                         status = excluded.status,
                         ts = excluded.ts,
                         size = excluded.size,
                         mime = excluded.mime,
                         data = excluded.data",
                    params![
                        stored.key.as_str(),
                        stored.status,
                        ts,
                        stored.size as i64,
                        stored.mime,
                        stored.data,
                    ],
                )?;
                Ok(ts)
            })
            .await?;
        self.last_stamp.fetch_max(record.ts, Ordering::AcqRel);

        debug!(key = record.key.short(), size = record.size, "stored media");

        if let Some(max_entries) = self.budget.max_entries {
            if let Err(e) = self.prune_media(max_entries).await {
                warn!(error = %e, max_entries, "media prune after write failed");
            }
        }
        if let Some(max_bytes) = self.budget.max_bytes {
            if let Err(e) = self.prune_media_bytes(max_bytes).await {
                warn!(error = %e, max_bytes, "media prune after write failed");
            }
        }

        Ok(record)
    }

    /// Point lookup. Does not refresh the record's timestamp.
    pub async fn get_media(&self, key: &MediaKey) -> Result<Option<MediaRecord>> {
        let key = key.clone();
        self.store
            .run_transaction(&[Collection::Media], TxMode::ReadOnly, move |tx| {
                Ok(tx
                    .query_row(
                        "SELECT key, status, ts, size, mime, data FROM media WHERE key = ?1",
                        params![key.as_str()],
                        row_to_media,
                    )
                    .optional()?)
            })
            .await
    }

    pub async fn delete_media(&self, key: &MediaKey) -> Result<bool> {
        let key = key.clone();
        self.store
            .run_transaction(&[Collection::Media], TxMode::ReadWrite, move |tx| {
                let affected =
                    tx.execute("DELETE FROM media WHERE key = ?1", params![key.as_str()])?;
                Ok(affected > 0)
            })
            .await
    }

    /// Delete the oldest records until at most `max_entries` remain.
    /// Returns the number deleted.
    pub async fn prune_media(&self, max_entries: usize) -> Result<usize> {
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        let deleted = self
            .store
            .run_transaction(&[Collection::Media], TxMode::ReadWrite, move |tx| {
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM media", [], |r| r.get(0))?;
                if count <= max {
                    return Ok(0);
                }
                let affected = tx.execute(
                    "DELETE FROM media WHERE key IN (
                         SELECT key FROM media ORDER BY ts ASC, key ASC LIMIT ?1
                     )",
                    params![count - max],
                )?;
                Ok(affected)
            })
            .await?;

        if deleted > 0 {
            debug!(deleted, max_entries, "pruned media by count");
        }
        Ok(deleted)
    }

    /// Delete the oldest records until the stored payloads total at most
    /// `max_bytes`. Returns the number deleted.
    pub async fn prune_media_bytes(&self, max_bytes: u64) -> Result<usize> {
        let max = i64::try_from(max_bytes).unwrap_or(i64::MAX);
        let deleted = self
            .store
            .run_transaction(&[Collection::Media], TxMode::ReadWrite, move |tx| {
                let total: i64 =
                    tx.query_row("SELECT COALESCE(SUM(size), 0) FROM media", [], |r| r.get(0))?;
                if total <= max {
                    return Ok(0);
                }

                let mut victims = Vec::new();
                {
                    let mut stmt =
                        tx.prepare("SELECT key, size FROM media ORDER BY ts ASC, key ASC")?;
                    let rows = stmt.query_map([], |r| {
                        Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
                    })?;

                    let mut remaining = total;
                    for row in rows {
                        if remaining <= max {
                            break;
                        }
                        let (key, size) = row?;
                        remaining -= size;
                        victims.push(key);
                    }
                }

                let mut stmt = tx.prepare("DELETE FROM media WHERE key = ?1")?;
                for key in &victims {
                    stmt.execute(params![key])?;
                }
                Ok(victims.len())
            })
            .await?;

        if deleted > 0 {
            debug!(deleted, max_bytes, "pruned media by size");
        }
        Ok(deleted)
    }

    /// Current `(record count, total payload bytes)`.
    pub async fn media_usage(&self) -> Result<(usize, u64)> {
        self.store
            .run_transaction(&[Collection::Media], TxMode::ReadOnly, |tx| {
                let (count, bytes): (i64, i64) = tx.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM media",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?;
                let count = usize::try_from(count)
                    .map_err(|_| StoreError::Corrupt(format!("negative media count {count}")))?;
                let bytes = u64::try_from(bytes)
                    .map_err(|_| StoreError::Corrupt(format!("negative media size {bytes}")))?;
                Ok((count, bytes))
            })
            .await
    }

    // Wall clock in ms, bumped so that successive writes never share a stamp.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_stamp.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaRecord> {
    let key: String = row.get(0)?;
    let size: i64 = row.get(3)?;
    let size = u64::try_from(size).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    Ok(MediaRecord {
        key: MediaKey::from_stored(key),
        status: row.get(1)?,
        ts: row.get(2)?,
        size,
        mime: row.get(4)?,
        data: row.get(5)?,
    })
}
