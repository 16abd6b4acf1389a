//! Maintenance-window integration (C10): caches the platform's
//! maintenance-window list and synthesizes ephemeral Running-only periods
//! from it for schedule evaluation. A sticky `HashMap` cache rather than
//! operator-driven in-progress state, since windows here are
//! platform-owned facts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::period::Period;

/// A maintenance window as reported by the managed platform for a given
/// account/region. `is_running` treats a 10-minute early-start buffer as
/// part of the window, mirroring the platform's own pre-window reboot
/// grace period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub account: String,
    pub region: String,
    pub window_id: String,
    pub window_name: String,
    pub schedule_timezone: Option<String>,
    pub next_execution_time: DateTime<Utc>,
    pub duration_hours: i64,
}

const EARLY_START_MINUTES: i64 = crate::constants::scheduling::MAINTENANCE_WINDOW_EARLY_START_MINUTES;

impl MaintenanceWindow {
    fn key(&self) -> (String, String) {
        (
            format!("{}:{}", self.account, self.region),
            format!("{}:{}", self.window_name, self.window_id),
        )
    }

    pub fn is_running(&self, ts: &DateTime<Utc>) -> bool {
        let start = self.next_execution_time - Duration::minutes(EARLY_START_MINUTES);
        let end = self.next_execution_time + Duration::hours(self.duration_hours);
        *ts >= start && *ts < end
    }

    /// Synthesize the ephemeral one-shot period a schedule should fold in
    /// while this window is active. Never persisted; appended to the
    /// schedule's period list for a single evaluation only.
    pub fn as_ephemeral_period(&self) -> Period {
        Period::always_running(format!("__maintenance_window:{}:{}", self.window_name, self.window_id))
    }
}

/// In-memory cache of the platform's current maintenance-window list,
/// keyed by `(account:region, window_name:window_id)`. Diffed against the
/// platform's list on each pass: new/changed entries upserted, vanished
/// ones deleted.
#[derive(Clone, Default)]
pub struct MaintenanceWindowCache {
    windows: Arc<RwLock<HashMap<(String, String), MaintenanceWindow>>>,
}

impl MaintenanceWindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, current), fields(account = %account, region = %region))]
    pub async fn reconcile(&self, account: &str, region: &str, current: Vec<MaintenanceWindow>) {
        let prefix = format!("{account}:{region}");
        let mut windows = self.windows.write().await;

        let incoming: HashMap<_, _> = current.into_iter().map(|w| (w.key(), w)).collect();
        let stale: Vec<_> = windows
            .keys()
            .filter(|(account_region, _)| *account_region == prefix)
            .filter(|key| !incoming.contains_key(*key))
            .cloned()
            .collect();
        for key in stale {
            debug!(?key, "maintenance window vanished from platform list");
            windows.remove(&key);
        }

        for (key, window) in incoming {
            windows.insert(key, window);
        }
    }

    pub async fn for_account_region(&self, account: &str, region: &str) -> Vec<MaintenanceWindow> {
        let windows = self.windows.read().await;
        windows
            .values()
            .filter(|w| w.account == account && w.region == region)
            .cloned()
            .collect()
    }

    pub async fn by_name(&self, account: &str, region: &str, window_name: &str) -> Option<MaintenanceWindow> {
        let windows = self.windows.read().await;
        windows
            .values()
            .find(|w| w.account == account && w.region == region && w.window_name == window_name)
            .cloned()
    }
}
