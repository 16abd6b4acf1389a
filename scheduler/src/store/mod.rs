//! Repository layer (C4): every definition/state entity is served through
//! the same three-layer shape — an in-memory store, a durable SQLite
//! store, and a caching wrapper that composes them. Bodies are persisted
//! as JSON rather than per-entity typed columns, since the entities here
//! (cron expressions, nested period lists) don't map cleanly onto a
//! fixed SQL schema.

mod cached;
mod memory;
mod sqlite;
mod transaction;

pub use cached::CachedStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteJsonStore;
pub use transaction::{PendingOp, WriteTransaction};

use crate::errors::StoreError;

/// Kind label used in `StoreError` messages, e.g. `"period"`, `"schedule"`.
pub type Kind = &'static str;

pub(crate) fn not_found(kind: Kind, key: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        key: key.to_string(),
    }
}

pub(crate) fn already_exists(kind: Kind, key: &str) -> StoreError {
    StoreError::AlreadyExists {
        kind,
        key: key.to_string(),
    }
}
