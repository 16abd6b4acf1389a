//! Caching wrapper (§4.4): reads fall through to the durable store on a
//! cache miss and populate the cache; writes hit the durable store first,
//! then the cache, so a write that is rejected durably never pollutes the
//! cache.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use super::{InMemoryStore, Kind, SqliteJsonStore};
use crate::errors::StoreError;

pub struct CachedStore<T: Clone + Send + Sync> {
    memory: InMemoryStore<T>,
    durable: SqliteJsonStore<T>,
}

impl<T> CachedStore<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    pub async fn new(pool: SqlitePool, table: &'static str, kind: Kind) -> Result<Self, StoreError> {
        Ok(Self {
            memory: InMemoryStore::new(kind),
            durable: SqliteJsonStore::new(pool, table, kind).await?,
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        if let Some(value) = self.memory.get(key).await {
            return Ok(Some(value));
        }
        let value = self.durable.get(key).await?;
        if let Some(value) = &value {
            self.memory.force_put(key, value.clone()).await;
        }
        Ok(value)
    }

    pub async fn list(&self) -> Result<Vec<(String, T)>, StoreError> {
        let rows = self.durable.list().await?;
        for (key, value) in &rows {
            self.memory.force_put(key, value.clone()).await;
        }
        Ok(rows)
    }

    pub async fn put(&self, key: &str, value: T, overwrite: bool) -> Result<(), StoreError> {
        self.durable.put(key, &value, overwrite).await?;
        self.memory.force_put(key, value).await;
        Ok(())
    }

    pub async fn delete(&self, key: &str, error_if_missing: bool) -> Result<(), StoreError> {
        self.durable.delete(key, error_if_missing).await?;
        self.memory.delete(key, false).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
    struct Widget {
        value: u32,
    }

    async fn in_memory_pool() -> SqlitePool {
        SqlitePool::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips_through_cache() {
        let pool = in_memory_pool().await;
        let store: CachedStore<Widget> = CachedStore::new(pool, "widgets", "widget").await.unwrap();
        store.put("a", Widget { value: 1 }, true).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(Widget { value: 1 }));
    }

    #[tokio::test]
    async fn get_populates_cache_from_durable_on_miss() {
        let pool = in_memory_pool().await;
        let store: CachedStore<Widget> = CachedStore::new(pool, "widgets", "widget").await.unwrap();
        store
            .durable
            .put("a", &Widget { value: 7 }, true)
            .await
            .unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(Widget { value: 7 }));
        // Second read must come from the now-populated cache.
        assert_eq!(store.memory.get("a").await, Some(Widget { value: 7 }));
    }

    #[tokio::test]
    async fn rejected_durable_write_does_not_populate_cache() {
        let pool = in_memory_pool().await;
        let store: CachedStore<Widget> = CachedStore::new(pool, "widgets", "widget").await.unwrap();
        store.put("a", Widget { value: 1 }, true).await.unwrap();
        let err = store.put("a", Widget { value: 2 }, false).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.get("a").await.unwrap(), Some(Widget { value: 1 }));
    }
}
