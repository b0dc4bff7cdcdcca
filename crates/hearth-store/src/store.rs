//! Store connection management.
//!
//! A [`Store`] owns the single [`rusqlite::Connection`] behind the timeline
//! cache. It is constructed unopened; the first call to
//! [`Store::initialize`] (or any transaction) opens the file, applies the
//! migration ladder and latches the outcome. Collections receive the store
//! as an `Arc<Store>` at construction time.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use hearth_shared::constants::TIMELINE_DB_FILE;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::error::{Result, StoreError};
use crate::migrations;

/// The named record collections (one SQLite table each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Rooms,
    Events,
    Members,
    Users,
    Media,
    Tokens,
    Meta,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Rooms => "rooms",
            Collection::Events => "events",
            Collection::Members => "members",
            Collection::Users => "users",
            Collection::Media => "media",
            Collection::Tokens => "tokens",
            Collection::Meta => "meta",
        }
    }
}

/// Transaction mode requested by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Deferred transaction; takes no write lock until it writes.
    ReadOnly,
    /// Immediate transaction; takes the write lock up front.
    ReadWrite,
}

impl TxMode {
    fn behavior(self) -> TransactionBehavior {
        match self {
            TxMode::ReadOnly => TransactionBehavior::Deferred,
            TxMode::ReadWrite => TransactionBehavior::Immediate,
        }
    }
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

type Handle = Arc<Mutex<Connection>>;

/// Lazily-opened handle to the timeline database.
pub struct Store {
    location: Location,
    // Ok(handle) once opened; Err(reason) latches a failed open.
    handle: OnceCell<std::result::Result<Handle, String>>,
}

impl Store {
    /// A store backed by the database file at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            handle: OnceCell::new(),
        }
    }

    /// A private in-memory database, discarded when the store is dropped.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            handle: OnceCell::new(),
        }
    }

    /// The platform data path for the timeline database:
    /// - Linux:   `~/.local/share/hearth/timeline.db`
    /// - macOS:   `~/Library/Application Support/org.hearth.hearth/timeline.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\hearth\hearth\data\timeline.db`
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("org", "hearth", "hearth").ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join(TIMELINE_DB_FILE))
    }

    /// Path of the backing file, `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Open the database and bring its schema up to date.
    ///
    /// Idempotent. Concurrent callers await the same in-flight open, and the
    /// outcome is remembered: after a failed open every call returns
    /// [`StoreError::Unavailable`] with the original reason.
    pub async fn initialize(&self) -> Result<()> {
        self.handle().await.map(|_| ())
    }

    /// Run `body` inside one SQLite transaction and commit it.
    ///
    /// `scope` names the collections the body touches. If `body` returns an
    /// error the transaction is rolled back and the error is returned as-is;
    /// commit failures surface as [`StoreError::Sqlite`]. No retries.
    pub async fn run_transaction<T, F>(
        &self,
        scope: &[Collection],
        mode: TxMode,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.handle().await?;

        debug!(?scope, ?mode, "running transaction");

        tokio::task::spawn_blocking(move || -> Result<T> {
            // A panic inside a body rolls its transaction back while
            // unwinding, so the connection is still usable.
            let mut conn = handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let tx = conn.transaction_with_behavior(mode.behavior())?;
            let value = body(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await?
    }

    /// Schema version recorded in the open database.
    pub async fn schema_version(&self) -> Result<u32> {
        self.run_transaction(&[Collection::Meta], TxMode::ReadOnly, |tx| {
            Ok(tx.pragma_query_value(None, "user_version", |row| row.get(0))?)
        })
        .await
    }

    async fn handle(&self) -> Result<Handle> {
        let outcome = self
            .handle
            .get_or_init(|| async {
                let location = self.location.clone();
                let opened = tokio::task::spawn_blocking(move || open_connection(&location)).await;
                match opened {
                    Ok(Ok(conn)) => Ok(Arc::new(Mutex::new(conn))),
                    Ok(Err(e)) => {
                        error!(error = %e, "failed to open timeline store");
                        Err(e.to_string())
                    }
                    Err(e) => {
                        error!(error = %e, "timeline store open task failed");
                        Err(e.to_string())
                    }
                }
            })
            .await;

        match outcome {
            Ok(handle) => Ok(Arc::clone(handle)),
            Err(reason) => Err(StoreError::Unavailable(reason.clone())),
        }
    }
}

fn open_connection(location: &Location) -> Result<Connection> {
    let mut conn = match location {
        Location::File(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            info!(path = %path.display(), "opening timeline store");
            let conn = Connection::open(path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn
        }
        Location::Memory => {
            debug!("opening in-memory timeline store");
            Connection::open_in_memory()?
        }
    };

    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations::run_migrations(&mut conn)?;

    Ok(conn)
}

/// In-memory store that is already initialized.
#[cfg(test)]
pub(crate) async fn memory_store() -> Arc<Store> {
    let store = Arc::new(Store::in_memory());
    store.initialize().await.expect("in-memory store should open");
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::migrations::SCHEMA_VERSION;

    #[tokio::test]
    async fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let store = Store::new(&path);
        store.initialize().await.expect("should open");
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
        assert_eq!(store.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn concurrent_initialize_opens_once() {
        let store = Store::in_memory();
        let (a, b, c) = tokio::join!(store.handle(), store.handle(), store.handle());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));

        store.initialize().await.unwrap();
        assert!(Arc::ptr_eq(&a, &store.handle().await.unwrap()));
    }

    #[tokio::test]
    async fn failed_open_is_latched() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let store = Store::new(blocker.join("timeline.db"));
        let first = store.initialize().await.unwrap_err();
        assert_eq!(first.kind(), ErrorKind::StorageUnavailable);

        let second = store
            .run_transaction(&[Collection::Meta], TxMode::ReadOnly, |_| Ok(()))
            .await
            .unwrap_err();
        assert_eq!(second.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[tokio::test]
    async fn failing_body_rolls_back() {
        let store = memory_store().await;

        let res: Result<()> = store
            .run_transaction(&[Collection::Meta], TxMode::ReadWrite, |tx| {
                tx.execute("INSERT INTO meta (key, value) VALUES ('k', '1')", [])?;
                Err(StoreError::Corrupt("abort".into()))
            })
            .await;
        assert!(matches!(res, Err(StoreError::Corrupt(_))));

        let count: i64 = store
            .run_transaction(&[Collection::Meta], TxMode::ReadOnly, |tx| {
                Ok(tx.query_row("SELECT COUNT(*) FROM meta WHERE key = 'k'", [], |r| r.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn engine_errors_are_storage_failures() {
        let store = memory_store().await;
        let err = store
            .run_transaction(&[Collection::Events], TxMode::ReadOnly, |tx| {
                Ok(tx.execute("SELECT * FROM no_such_table", [])?)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }
}
