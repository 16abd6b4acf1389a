// File: scheduler/src/config/mod.rs
//! Global configuration plus period/schedule definitions (§3 GlobalConfig,
//! §1.1 ambient configuration layer). Definitions are operator-owned and
//! read-only to the core; `ConfigManager` hot-reloads them behind
//! `Arc<RwLock<Arc<GlobalConfig>>>` so readers never block on reload.

pub mod manager;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use manager::{ConfigManager, ConfigSource};

use crate::period::Period;
use crate::schedule::Schedule;

/// The single operator-authored configuration row (§3: "single row").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub scheduled_services: Vec<String>,
    pub regions: Vec<String>,
    pub default_timezone: String,
    pub schedule_tag_key: String,
    /// May contain `{param:NAME}` indirections, resolved via `ParameterResolver`.
    pub remote_account_ids: Vec<String>,
    pub partition: String,
    pub role_name: String,
    pub scheduling_interval_minutes: u64,
    pub hub_account_inclusion: bool,
    pub use_maintenance_window: bool,
    pub cluster_scheduling_enabled: bool,
    pub create_rds_snapshot: bool,
    pub default_target_concurrency: usize,
    pub stack_name: String,
    pub uuid_key: String,
    pub metrics_endpoint: Option<String>,
    pub solution_id: Option<String>,
    pub solution_version: Option<String>,
    /// Webhook `AlertService` sends pass-failure/ICE/recovery notifications to.
    #[serde(default)]
    pub alarm_webhook_url: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            scheduled_services: vec!["vm".into()],
            regions: vec!["us-east-1".into()],
            default_timezone: crate::constants::defaults::DEFAULT_TIMEZONE.to_string(),
            schedule_tag_key: crate::constants::defaults::DEFAULT_SCHEDULE_TAG_KEY.to_string(),
            remote_account_ids: Vec::new(),
            partition: "aws".into(),
            role_name: "scheduler-execution-role".into(),
            scheduling_interval_minutes: crate::constants::scheduling::DEFAULT_SCHEDULING_INTERVAL_MINUTES,
            hub_account_inclusion: true,
            use_maintenance_window: false,
            cluster_scheduling_enabled: false,
            create_rds_snapshot: false,
            default_target_concurrency: crate::constants::scheduling::DEFAULT_TARGET_CONCURRENCY,
            stack_name: "scheduler".into(),
            uuid_key: String::new(),
            metrics_endpoint: None,
            solution_id: None,
            solution_version: None,
            alarm_webhook_url: None,
        }
    }
}

/// Resolves `{param:NAME}` indirections in `remote_account_ids`. Since no
/// concrete external parameter store is in scope, the default
/// implementation resolves `NAME` against an environment variable of the
/// same name — a named collaborator with a bounded contract, not a
/// component to build out (§9.1).
pub trait ParameterResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

pub struct EnvParameterResolver;

impl ParameterResolver for EnvParameterResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Expand every `{param:NAME}` entry in `remote_account_ids`, dropping any
/// that cannot be resolved and logging a warning for each.
pub fn resolve_remote_account_ids(config: &GlobalConfig, resolver: &dyn ParameterResolver) -> Vec<String> {
    config
        .remote_account_ids
        .iter()
        .filter_map(|entry| {
            if let Some(name) = entry.strip_prefix("{param:").and_then(|s| s.strip_suffix('}')) {
                let resolved = resolver.resolve(name);
                if resolved.is_none() {
                    tracing::warn!(param = %name, "unresolved remote-account parameter indirection");
                }
                resolved
            } else {
                Some(entry.clone())
            }
        })
        .collect()
}

/// In-memory definitions snapshot handed to the executor for one pass.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    pub periods: HashMap<String, Period>,
    pub schedules: HashMap<String, Schedule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeResolver;
    impl ParameterResolver for FakeResolver {
        fn resolve(&self, name: &str) -> Option<String> {
            if name == "HUB_ACCOUNT" {
                Some("222222222222".into())
            } else {
                None
            }
        }
    }

    #[test]
    fn resolves_param_indirection_and_drops_unresolved() {
        let config = GlobalConfig {
            remote_account_ids: vec!["111111111111".into(), "{param:HUB_ACCOUNT}".into(), "{param:MISSING}".into()],
            ..GlobalConfig::default()
        };
        let resolved = resolve_remote_account_ids(&config, &FakeResolver);
        assert_eq!(resolved, vec!["111111111111".to_string(), "222222222222".to_string()]);
    }
}
