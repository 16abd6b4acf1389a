use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod adapters;
mod config;
mod constants;
mod cron;
mod decision;
mod errors;
mod executor;
mod ice_retry;
mod maintenance_window;
mod operation_tracker;
mod orchestrator;
mod period;
mod schedule;
mod services;
mod state;
mod store;
mod web;

use adapters::vm::NoopVmClient;
use config::ConfigManager;
use constants::cleanup;
use ice_retry::IceRetryQueue;
use maintenance_window::MaintenanceWindowCache;
use operation_tracker::SimpleOperationTracker;
use orchestrator::{Orchestrator, OrchestratorStatus};
use services::AlertService;
use state::ResourceStateStore;
use web::{start_web_server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("scheduler=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);
    fmt().with_env_filter(env_filter).init();

    info!("Starting instance scheduler");

    let db_path = std::env::var("SCHEDULER_DB_PATH").unwrap_or_else(|_| "data/scheduler.db".to_string());
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let connect_options = SqliteConnectOptions::from_str(&format!("sqlite://{db_path}"))?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(5).connect_with(connect_options).await?;
    info!("database pool connected at {}", db_path);

    let config_dir = std::env::var("SCHEDULER_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config_manager = Arc::new(ConfigManager::new(config_dir, pool.clone()).await?);
    let config = config_manager.get_current_config().await;
    let definitions = config_manager.get_current_definitions().await;
    info!(
        "configuration loaded: {} periods, {} schedules, source={:?}",
        definitions.periods.len(),
        definitions.schedules.len(),
        config_manager.get_source()
    );

    let tracker = Arc::new(SimpleOperationTracker::new());
    let state_store = Arc::new(ResourceStateStore::new(pool.clone()).await?);
    let maintenance_windows = Arc::new(MaintenanceWindowCache::new());
    let alert_service = Arc::new(AlertService::new(config.alarm_webhook_url.clone().unwrap_or_default()));
    let (ice_queue, ice_receiver) = IceRetryQueue::new();
    let status = OrchestratorStatus::new();

    let hub_account = std::env::var("SCHEDULER_HUB_ACCOUNT").unwrap_or_else(|_| "000000000000".to_string());
    let orchestrator = Arc::new(Orchestrator::new(
        config_manager.clone(),
        tracker.clone(),
        state_store.clone(),
        alert_service.clone(),
        ice_queue,
        maintenance_windows.clone(),
        NoopVmClient,
        hub_account,
        status.clone(),
    ));

    // ICE-retry consumer: drains capacity-retry messages in the background
    // for the life of the process (§4.11). No production cloud client is
    // wired (§9.1), so retrying here only logs the attempt.
    tokio::spawn(async move {
        ice_retry::run_consumer(ice_receiver, |message| async move {
            warn!(
                instance_id = %message.instance_id,
                "ICE retry consumer has no wired cloud client to retry against"
            );
        })
        .await;
    });

    // Stuck-operation cleanup sweep.
    {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(cleanup::CLEANUP_INTERVAL_SECONDS));
            loop {
                interval.tick().await;
                let cleaned = tracker.cleanup_old_operations(cleanup::OPERATION_CLEANUP_HOURS).await;
                if cleaned > 0 {
                    warn!("cleaned up {} stuck scheduling operations", cleaned);
                }
            }
        });
    }

    // Orchestrator tick, driven by `tokio-cron-scheduler` at the
    // operator-configured interval (§4.9).
    let job_scheduler = JobScheduler::new().await.map_err(|e| anyhow!("failed to create job scheduler: {e}"))?;
    let tick_cron = format!("0 */{} * * * *", config.scheduling_interval_minutes.max(1));
    let orchestrator_for_job = orchestrator.clone();
    let tick_job = Job::new_async(tick_cron.as_str(), move |_uuid, _scheduler| {
        let orchestrator = orchestrator_for_job.clone();
        Box::pin(async move {
            orchestrator.run_tick().await;
        })
    })
    .map_err(|e| anyhow!("invalid orchestrator tick cron expression: {e}"))?;
    job_scheduler
        .add(tick_job)
        .await
        .map_err(|e| anyhow!("failed to register orchestrator tick job: {e}"))?;
    job_scheduler.start().await.map_err(|e| anyhow!("failed to start job scheduler: {e}"))?;
    info!("orchestrator tick scheduled every {} minute(s)", config.scheduling_interval_minutes);

    let app_state = AppState::new(config_manager, tracker, status);
    let bind_addr = std::env::var("SCHEDULER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8095".to_string());
    start_web_server(&bind_addr, app_state).await
}
