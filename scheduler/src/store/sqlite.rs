//! Durable SQLite repository: one table per entity kind, a text primary
//! key and a JSON-encoded body column. Connect-then-initialize-tables on
//! construction, with a single generic table shape since every entity
//! here already serializes cleanly through `serde_json`.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use super::{already_exists, not_found, Kind};
use crate::errors::StoreError;

pub struct SqliteJsonStore<T> {
    pool: SqlitePool,
    table: &'static str,
    kind: Kind,
    _marker: PhantomData<T>,
}

impl<T> SqliteJsonStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    #[instrument(skip(pool), fields(table = table))]
    pub async fn new(pool: SqlitePool, table: &'static str, kind: Kind) -> Result<Self, StoreError> {
        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )"
        );
        sqlx::query(&create_sql)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Backend {
                reason: e.to_string(),
            })?;
        debug!("ensured table exists");
        Ok(Self {
            pool,
            table,
            kind,
            _marker: PhantomData,
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        let row = sqlx::query(&format!("SELECT body FROM {} WHERE key = ?", self.table))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                reason: e.to_string(),
            })?;
        match row {
            None => Ok(None),
            Some(row) => {
                let body: String = row.get("body");
                let value = serde_json::from_str(&body).map_err(|e| StoreError::Serialization {
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<(String, T)>, StoreError> {
        let rows = sqlx::query(&format!("SELECT key, body FROM {} ORDER BY key", self.table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                reason: e.to_string(),
            })?;
        rows.into_iter()
            .map(|row| {
                let key: String = row.get("key");
                let body: String = row.get("body");
                let value: T = serde_json::from_str(&body).map_err(|e| StoreError::Serialization {
                    reason: e.to_string(),
                })?;
                Ok((key, value))
            })
            .collect()
    }

    pub async fn put(&self, key: &str, value: &T, overwrite: bool) -> Result<(), StoreError> {
        if !overwrite && self.get(key).await?.is_some() {
            return Err(already_exists(self.kind, key));
        }
        let body = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;
        sqlx::query(&format!(
            "INSERT INTO {} (key, body) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            self.table
        ))
        .bind(key)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub async fn delete(&self, key: &str, error_if_missing: bool) -> Result<(), StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE key = ?", self.table))
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                reason: e.to_string(),
            })?;
        if result.rows_affected() == 0 && error_if_missing {
            return Err(not_found(self.kind, key));
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn table(&self) -> &'static str {
        self.table
    }
}
