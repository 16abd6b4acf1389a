// File: scheduler/src/config/manager.rs
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use sqlx::SqlitePool;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{Definitions, GlobalConfig};
use crate::period::Period;
use crate::schedule::Schedule;
use crate::store::CachedStore;

const GLOBAL_CONFIG_KEY: &str = "scheduler";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Database,
    TomlFiles,
}

/// Holds the current `GlobalConfig` plus period/schedule definitions
/// behind `Arc<RwLock<Arc<_>>>`, reloadable without a restart.
pub struct ConfigManager {
    config: Arc<RwLock<Arc<GlobalConfig>>>,
    definitions: Arc<RwLock<Arc<Definitions>>>,
    global_config_store: CachedStore<GlobalConfig>,
    period_store: CachedStore<Period>,
    schedule_store: CachedStore<Schedule>,
    config_dir: String,
    source: ConfigSource,
}

impl ConfigManager {
    /// Load from the database if a `GlobalConfig` row already exists;
    /// otherwise fall back to TOML files under `config_dir` and
    /// auto-import them into the database for subsequent runs.
    pub async fn new(config_dir: String, pool: SqlitePool) -> Result<Self> {
        let global_config_store = CachedStore::new(pool.clone(), "global_config", "global-config").await?;
        let period_store = CachedStore::new(pool.clone(), "periods", "period").await?;
        let schedule_store = CachedStore::new(pool, "schedules", "schedule").await?;

        if let Some(config) = global_config_store.get(GLOBAL_CONFIG_KEY).await? {
            info!("loading configuration from database");
            let definitions = Self::load_definitions(&period_store, &schedule_store).await?;
            Ok(Self {
                config: Arc::new(RwLock::new(Arc::new(config))),
                definitions: Arc::new(RwLock::new(Arc::new(definitions))),
                global_config_store,
                period_store,
                schedule_store,
                config_dir,
                source: ConfigSource::Database,
            })
        } else {
            info!("no configuration in database, loading from TOML files");
            let (config, definitions) = Self::load_from_toml(&config_dir).await?;

            global_config_store
                .put(GLOBAL_CONFIG_KEY, config.clone(), true)
                .await?;
            for (name, period) in &definitions.periods {
                period_store.put(name, period.clone(), true).await?;
            }
            for (name, schedule) in &definitions.schedules {
                schedule_store.put(name, schedule.clone(), true).await?;
            }

            Ok(Self {
                config: Arc::new(RwLock::new(Arc::new(config))),
                definitions: Arc::new(RwLock::new(Arc::new(definitions))),
                global_config_store,
                period_store,
                schedule_store,
                config_dir,
                source: ConfigSource::Database,
            })
        }
    }

    pub async fn get_current_config(&self) -> Arc<GlobalConfig> {
        self.config.read().await.clone()
    }

    pub async fn get_current_definitions(&self) -> Arc<Definitions> {
        self.definitions.read().await.clone()
    }

    pub fn get_source(&self) -> &ConfigSource {
        &self.source
    }

    /// Reload `GlobalConfig` and definitions from the database without
    /// disturbing readers mid-read (`Arc<RwLock<Arc<_>>>` swap).
    pub async fn reload_from_database(&self) -> Result<()> {
        let config = self
            .global_config_store
            .get(GLOBAL_CONFIG_KEY)
            .await?
            .ok_or_else(|| anyhow!("no GlobalConfig row found in database"))?;
        let definitions = Self::load_definitions(&self.period_store, &self.schedule_store).await?;

        *self.config.write().await = Arc::new(config);
        *self.definitions.write().await = Arc::new(definitions);
        info!("configuration reloaded from database");
        Ok(())
    }

    /// Re-import TOML files over the database (operator-triggered merge),
    /// then reload.
    pub async fn reimport_from_toml(&self) -> Result<()> {
        let (config, definitions) = Self::load_from_toml(&self.config_dir).await?;
        self.global_config_store
            .put(GLOBAL_CONFIG_KEY, config, true)
            .await?;
        for (name, period) in definitions.periods {
            self.period_store.put(&name, period, true).await?;
        }
        for (name, schedule) in definitions.schedules {
            self.schedule_store.put(&name, schedule, true).await?;
        }
        self.reload_from_database().await
    }

    /// Admin operation backing the CLI's `create-period`/`update-period`
    /// (§6 CLI request envelope): `overwrite=false` rejects an existing
    /// name, matching `describe-periods`' "partial-load" read-your-writes
    /// expectation.
    pub async fn put_period(&self, name: &str, period: Period, overwrite: bool) -> Result<()> {
        period.validate().map_err(|e| anyhow!("{e}"))?;
        self.period_store.put(name, period, overwrite).await?;
        self.reload_from_database().await
    }

    pub async fn delete_period(&self, name: &str) -> Result<()> {
        self.period_store.delete(name, true).await?;
        self.reload_from_database().await
    }

    pub async fn describe_periods(&self) -> Vec<Period> {
        self.get_current_definitions()
            .await
            .periods
            .values()
            .cloned()
            .collect()
    }

    pub async fn put_schedule(&self, name: &str, schedule: Schedule, overwrite: bool) -> Result<()> {
        let period_names: Vec<String> = self.period_store.list().await?.into_iter().map(|(n, _)| n).collect();
        schedule.validate(&period_names).map_err(|e| anyhow!("{e}"))?;
        self.schedule_store.put(name, schedule, overwrite).await?;
        self.reload_from_database().await
    }

    pub async fn delete_schedule(&self, name: &str) -> Result<()> {
        self.schedule_store.delete(name, true).await?;
        self.reload_from_database().await
    }

    pub async fn describe_schedules(&self) -> Vec<Schedule> {
        self.get_current_definitions()
            .await
            .schedules
            .values()
            .cloned()
            .collect()
    }

    /// `describe-schedule-usage`: the periods a schedule references plus
    /// their resolved definitions, for an operator inspecting why a
    /// schedule behaves the way it does.
    pub async fn describe_schedule_usage(&self, schedule_name: &str) -> Option<Vec<Period>> {
        let definitions = self.get_current_definitions().await;
        let schedule = definitions.schedules.get(schedule_name)?;
        Some(
            schedule
                .periods
                .iter()
                .filter_map(|period_ref| definitions.periods.get(&period_ref.period_name).cloned())
                .collect(),
        )
    }

    async fn load_definitions(
        period_store: &CachedStore<Period>,
        schedule_store: &CachedStore<Schedule>,
    ) -> Result<Definitions> {
        let mut periods = HashMap::new();
        for (name, period) in period_store.list().await? {
            if let Err(e) = period.validate() {
                warn!(period = %name, error = %e, "skipping invalid period definition");
                continue;
            }
            periods.insert(name, period);
        }

        let period_names: Vec<String> = periods.keys().cloned().collect();
        let mut schedules = HashMap::new();
        for (name, schedule) in schedule_store.list().await? {
            if let Err(e) = schedule.validate(&period_names) {
                warn!(schedule = %name, error = %e, "skipping invalid schedule definition");
                continue;
            }
            schedules.insert(name, schedule);
        }

        Ok(Definitions { periods, schedules })
    }

    /// TOML fallback layout: `{config_dir}/global.toml` for `GlobalConfig`,
    /// `{config_dir}/periods.toml` for `{name: Period}`, `{config_dir}/schedules.toml`
    /// for `{name: Schedule}`.
    async fn load_from_toml(config_dir: &str) -> Result<(GlobalConfig, Definitions)> {
        let global_path = Path::new(config_dir).join("global.toml");
        let global_content = fs::read_to_string(&global_path)
            .await
            .map_err(|e| anyhow!("failed to read {}: {e}", global_path.display()))?;
        let config: GlobalConfig =
            toml::from_str(&global_content).map_err(|e| anyhow!("failed to parse {}: {e}", global_path.display()))?;

        let periods_path = Path::new(config_dir).join("periods.toml");
        let periods: HashMap<String, Period> = match fs::read_to_string(&periods_path).await {
            Ok(content) => toml::from_str(&content).map_err(|e| anyhow!("failed to parse {}: {e}", periods_path.display()))?,
            Err(_) => HashMap::new(),
        };

        let schedules_path = Path::new(config_dir).join("schedules.toml");
        let schedules: HashMap<String, Schedule> = match fs::read_to_string(&schedules_path).await {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| anyhow!("failed to parse {}: {e}", schedules_path.display()))?
            }
            Err(_) => HashMap::new(),
        };

        info!(
            periods = periods.len(),
            schedules = schedules.len(),
            "loaded configuration from TOML files"
        );

        Ok((config, Definitions { periods, schedules }))
    }
}
