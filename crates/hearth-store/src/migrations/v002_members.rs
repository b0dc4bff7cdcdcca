use rusqlite::Transaction;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS members (
    room_id      TEXT NOT NULL,
    user_id      TEXT NOT NULL,
    display_name TEXT,
    avatar       TEXT,
    membership   TEXT NOT NULL,                 -- joined | left | invited

    PRIMARY KEY (room_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_members_room ON members(room_id);
"#;

pub fn up(tx: &Transaction<'_>) -> Result<(), rusqlite::Error> {
    tx.execute_batch(UP_SQL)
}
