//! Arbitrary key -> JSON value settings.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::store::{Collection, Store, TxMode};

pub struct MetaCollection {
    store: Arc<Store>,
}

impl MetaCollection {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn set_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let key = key.to_string();
        let json = serde_json::to_string(value)?;
        self.store
            .run_transaction(&[Collection::Meta], TxMode::ReadWrite, move |tx| {
                tx.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, json],
                )?;
                Ok(())
            })
            .await
    }

    /// `None` if the key was never set. A stored value that does not
    /// deserialize as `T` is an error.
    pub async fn get_meta<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let key = key.to_string();
        let json: Option<String> = self
            .store
            .run_transaction(&[Collection::Meta], TxMode::ReadOnly, move |tx| {
                Ok(tx
                    .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |r| {
                        r.get(0)
                    })
                    .optional()?)
            })
            .await?;

        json.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(Into::into)
    }

    pub async fn delete_meta(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.store
            .run_transaction(&[Collection::Meta], TxMode::ReadWrite, move |tx| {
                let affected = tx.execute("DELETE FROM meta WHERE key = ?1", params![key])?;
                Ok(affected > 0)
            })
            .await
    }
}
