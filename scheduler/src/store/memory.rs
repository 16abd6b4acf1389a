//! In-memory repository: a `HashMap` guarded by `RwLock`, matching the
//! conditional-check semantics (`overwrite`, `error_if_missing`) the
//! durable store enforces.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{already_exists, not_found, Kind};
use crate::errors::StoreError;

#[derive(Clone)]
pub struct InMemoryStore<T: Clone + Send + Sync> {
    kind: Kind,
    rows: Arc<RwLock<HashMap<String, T>>>,
}

impl<T: Clone + Send + Sync> InMemoryStore<T> {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        self.rows.read().await.get(key).cloned()
    }

    pub async fn list(&self) -> Vec<(String, T)> {
        self.rows
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn put(&self, key: &str, value: T, overwrite: bool) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if !overwrite && rows.contains_key(key) {
            return Err(already_exists(self.kind, key));
        }
        rows.insert(key.to_string(), value);
        Ok(())
    }

    /// Unconditional overwrite, used when the cache is repopulated from the
    /// durable store after a miss or after a durable write has already
    /// succeeded.
    pub async fn force_put(&self, key: &str, value: T) {
        self.rows.write().await.insert(key.to_string(), value);
    }

    pub async fn delete(&self, key: &str, error_if_missing: bool) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.remove(key).is_none() && error_if_missing {
            return Err(not_found(self.kind, key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_without_overwrite_rejects_existing_key() {
        let store: InMemoryStore<String> = InMemoryStore::new("widget");
        store.put("a", "one".into(), false).await.unwrap();
        let err = store.put("a", "two".into(), false).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn delete_missing_without_error_if_missing_is_noop() {
        let store: InMemoryStore<String> = InMemoryStore::new("widget");
        assert!(store.delete("missing", false).await.is_ok());
        assert!(store.delete("missing", true).await.is_err());
    }
}
