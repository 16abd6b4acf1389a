//! Multi-item atomic writes against the durable store (§4.4): a
//! transaction accumulates put/delete operations and applies them all
//! inside a single `sqlx` transaction on `commit`. There is no async
//! `Drop` in Rust, so "commits on scope exit" is expressed as an explicit
//! consuming `commit()` call rather than an implicit destructor.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::StoreError;

pub enum PendingOp {
    Put {
        table: &'static str,
        key: String,
        body: String,
        overwrite: bool,
    },
    Delete {
        table: &'static str,
        key: String,
        error_if_missing: bool,
    },
}

pub struct WriteTransaction {
    pool: SqlitePool,
    ops: Vec<PendingOp>,
}

impl WriteTransaction {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            ops: Vec::new(),
        }
    }

    pub fn put<T: Serialize>(
        &mut self,
        table: &'static str,
        key: &str,
        value: &T,
        overwrite: bool,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;
        self.ops.push(PendingOp::Put {
            table,
            key: key.to_string(),
            body,
            overwrite,
        });
        Ok(())
    }

    pub fn delete(&mut self, table: &'static str, key: &str, error_if_missing: bool) {
        self.ops.push(PendingOp::Delete {
            table,
            key: key.to_string(),
            error_if_missing,
        });
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend {
                reason: e.to_string(),
            })?;

        for op in self.ops {
            match op {
                PendingOp::Put {
                    table,
                    key,
                    body,
                    overwrite,
                } => {
                    if !overwrite {
                        let existing: Option<(String,)> =
                            sqlx::query_as(&format!("SELECT key FROM {table} WHERE key = ?"))
                                .bind(&key)
                                .fetch_optional(&mut *tx)
                                .await
                                .map_err(|e| StoreError::Backend {
                                    reason: e.to_string(),
                                })?;
                        if existing.is_some() {
                            return Err(StoreError::AlreadyExists { kind: table, key });
                        }
                    }
                    sqlx::query(&format!(
                        "INSERT INTO {table} (key, body) VALUES (?, ?)
                         ON CONFLICT(key) DO UPDATE SET body = excluded.body"
                    ))
                    .bind(&key)
                    .bind(&body)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend {
                        reason: e.to_string(),
                    })?;
                }
                PendingOp::Delete {
                    table,
                    key,
                    error_if_missing,
                } => {
                    let result = sqlx::query(&format!("DELETE FROM {table} WHERE key = ?"))
                        .bind(&key)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| StoreError::Backend {
                            reason: e.to_string(),
                        })?;
                    if result.rows_affected() == 0 && error_if_missing {
                        return Err(StoreError::NotFound { kind: table, key });
                    }
                }
            }
        }

        tx.commit().await.map_err(|e| StoreError::Backend {
            reason: e.to_string(),
        })
    }
}
