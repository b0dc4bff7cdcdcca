//! Schema migration runner.
//!
//! Migrations run in order when a [`Store`](crate::Store) is first opened.
//! Each step is guarded by the `user_version` pragma, runs in its own
//! transaction and only ever adds tables and indices, so upgrading never
//! touches existing rows.

pub mod v001_initial;
pub mod v002_members;
pub mod v003_media;

use rusqlite::{params, Connection, Transaction};

use crate::error::{Result, StoreError};

/// Current schema version. Bump this and append to [`STEPS`] whenever the
/// schema changes.
pub const SCHEMA_VERSION: u32 = 3;

/// Meta keys written after every applied step.
pub const META_SCHEMA_VERSION: &str = "schema.version";
pub const META_SCHEMA_UPGRADED_AT: &str = "schema.upgraded_at";

type Step = fn(&Transaction<'_>) -> rusqlite::Result<()>;

const STEPS: &[(u32, &str, Step)] = &[
    (1, "v001_initial", v001_initial::up),
    (2, "v002_members", v002_members::up),
    (3, "v003_media", v003_media::up),
];

/// Apply every pending migration and return the resulting version.
pub fn run_migrations(conn: &mut Connection) -> Result<u32> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = SCHEMA_VERSION,
        "checking database migrations"
    );

    if current > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        )));
    }

    for &(version, name, up) in STEPS.iter().filter(|(v, _, _)| *v > current) {
        tracing::info!(migration = name, "applying migration");

        let tx = conn.transaction()?;
        up(&tx).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        tx.pragma_update(None, "user_version", version)?;
        record_version(&tx, version)?;
        tx.commit()?;
    }

    Ok(SCHEMA_VERSION)
}

fn record_version(tx: &Transaction<'_>, version: u32) -> Result<()> {
    let upgraded_at = chrono::Utc::now().to_rfc3339();
    let mut stmt = tx.prepare(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )?;
    stmt.execute(params![META_SCHEMA_VERSION, serde_json::to_string(&version)?])?;
    stmt.execute(params![
        META_SCHEMA_UPGRADED_AT,
        serde_json::to_string(&upgraded_at)?
    ])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'index') ORDER BY name")
            .unwrap();
        stmt.query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn fresh_database_reaches_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), SCHEMA_VERSION);

        let names = tables(&conn);
        for expected in [
            "rooms",
            "events",
            "idx_events_room_ts",
            "users",
            "tokens",
            "meta",
            "members",
            "idx_members_room",
            "media",
            "idx_media_ts",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }

        let version: String = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [META_SCHEMA_VERSION], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());
    }

    #[test]
    fn rerun_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute("INSERT INTO users (user_id, display_name) VALUES ('@a', 'A')", [])
            .unwrap();

        run_migrations(&mut conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn upgrade_from_v1_keeps_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        {
            let tx = conn.transaction().unwrap();
            v001_initial::up(&tx).unwrap();
            tx.pragma_update(None, "user_version", 1).unwrap();
            tx.execute(
                "INSERT INTO events (id, room_id, sender, ts, content) VALUES ('$e', '!r', '@a', 5, '{}')",
                [],
            )
            .unwrap();
            tx.commit().unwrap();
        }

        run_migrations(&mut conn).unwrap();

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let ts: i64 = conn
            .query_row("SELECT ts FROM events WHERE id = '$e'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(ts, 5);
        assert!(tables(&conn).iter().any(|n| n == "media"));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(
            run_migrations(&mut conn),
            Err(StoreError::Migration(_))
        ));
    }
}
