//! Resource-state memory (C5): the per-target map from resource id to its
//! last-known scheduling state, the only persistence the decision engine
//! needs across passes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::errors::StoreError;
use crate::store::CachedStore;

/// The scheduler's own record of what it last did to a resource, distinct
/// from the resource's actually-observed cloud state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoredState {
    Running,
    Stopped,
    /// Sticky: once set, end-of-period transitions do not stop the
    /// instance until the next period start.
    RetainRunning,
    StartFailed,
    StopFailed,
    ConfigurationFailed,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStateRecord {
    pub stored_state: StoredState,
    pub last_seen_size: Option<String>,
    pub resize_target: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

impl ResourceStateRecord {
    pub fn unseen() -> Self {
        Self {
            stored_state: StoredState::Unknown,
            last_seen_size: None,
            resize_target: None,
            last_action_time: None,
        }
    }

    pub fn is_retain_running(&self) -> bool {
        self.stored_state == StoredState::RetainRunning
    }
}

/// A map from resource id to its state record, keyed in the store by
/// `(service, account, region)`.
pub type ResourceStateMap = HashMap<String, ResourceStateRecord>;

fn target_key(service: &str, account: &str, region: &str) -> String {
    format!("{service}:{account}:{region}")
}

/// Thin wrapper over `CachedStore<ResourceStateMap>` exposing the
/// load/save verbs §4.5 names instead of generic get/put.
pub struct ResourceStateStore {
    inner: CachedStore<ResourceStateMap>,
}

impl ResourceStateStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        Ok(Self {
            inner: CachedStore::new(pool, "resource_state", "resource_state_map").await?,
        })
    }

    /// Reads the whole per-target map at the start of a scheduling pass.
    pub async fn load(&self, service: &str, account: &str, region: &str) -> Result<ResourceStateMap, StoreError> {
        let key = target_key(service, account, region);
        Ok(self.inner.get(&key).await?.unwrap_or_default())
    }

    /// Writes the whole per-target map back at the end of a pass.
    pub async fn save(
        &self,
        service: &str,
        account: &str,
        region: &str,
        records: ResourceStateMap,
    ) -> Result<(), StoreError> {
        let key = target_key(service, account, region);
        self.inner.put(&key, records, true).await
    }
}

/// A resource known to the registry, searchable by scheduling target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredInstance {
    pub account: String,
    pub region: String,
    pub service: String,
    pub resource_id: String,
    pub arn: String,
    pub schedule: Option<String>,
    pub display_name: Option<String>,
    pub runtime_info: serde_json::Value,
    pub registry_info: serde_json::Value,
}

impl RegisteredInstance {
    /// Sort key supporting range scans per (account, region, service).
    pub fn sort_key(&self) -> String {
        format!("resource#{}#{}#{}", self.region, self.service, self.resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_record_defaults_to_unknown() {
        let record = ResourceStateRecord::unseen();
        assert_eq!(record.stored_state, StoredState::Unknown);
        assert!(!record.is_retain_running());
    }

    #[test]
    fn sort_key_supports_range_scan_ordering() {
        let instance = RegisteredInstance {
            account: "111111111111".into(),
            region: "us-east-1".into(),
            service: "vm".into(),
            resource_id: "i-0abc".into(),
            arn: "arn:aws:ec2:us-east-1:111111111111:instance/i-0abc".into(),
            schedule: Some("business-hours".into()),
            display_name: None,
            runtime_info: serde_json::json!({}),
            registry_info: serde_json::json!({}),
        };
        assert_eq!(instance.sort_key(), "resource#us-east-1#vm#i-0abc");
    }
}
