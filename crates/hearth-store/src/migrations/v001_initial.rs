//! v001 -- Initial schema creation.
//!
//! Creates the core collections: `rooms`, `events`, `users`, `tokens` and
//! `meta`.

use rusqlite::Transaction;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Rooms (conversations)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS rooms (
    id            TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL,
    last_activity INTEGER NOT NULL,             -- ms since epoch
    avatar        TEXT,
    unread        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_rooms_activity ON rooms(last_activity DESC);

-- ----------------------------------------------------------------
-- Events
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS events (
    id      TEXT PRIMARY KEY NOT NULL,
    room_id TEXT NOT NULL,
    sender  TEXT NOT NULL,
    ts      INTEGER NOT NULL,                   -- origin timestamp, ms
    content TEXT NOT NULL                       -- opaque JSON payload
);

-- id breaks ties between equal timestamps
CREATE INDEX IF NOT EXISTS idx_events_room_ts ON events(room_id, ts, id);

-- ----------------------------------------------------------------
-- User profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY NOT NULL,
    display_name TEXT,
    avatar       TEXT
);

-- ----------------------------------------------------------------
-- Backward pagination tokens
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tokens (
    room_id TEXT PRIMARY KEY NOT NULL,
    token   TEXT                                -- NULL = history exhausted
);

-- ----------------------------------------------------------------
-- Meta (schema bookkeeping, small settings)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL                         -- JSON
);
"#;

/// Apply the initial migration.
pub fn up(tx: &Transaction<'_>) -> Result<(), rusqlite::Error> {
    tx.execute_batch(UP_SQL)
}
