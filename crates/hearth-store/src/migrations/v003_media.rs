use rusqlite::Transaction;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS media (
    key    TEXT PRIMARY KEY NOT NULL,           -- BLAKE3 hex of the payload
    status INTEGER NOT NULL,
    ts     INTEGER NOT NULL,                    -- last write, ms
    size   INTEGER NOT NULL,
    mime   TEXT NOT NULL,
    data   BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_media_ts ON media(ts, key);
"#;

pub fn up(tx: &Transaction<'_>) -> Result<(), rusqlite::Error> {
    tx.execute_batch(UP_SQL)
}
