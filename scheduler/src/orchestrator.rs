//! Orchestrator (C9): enumerates the `(account × region × service)` cross
//! product from `GlobalConfig` and dispatches one scheduling request per
//! target with bounded parallelism. The periodic tick itself is driven by
//! `tokio-cron-scheduler`'s `JobScheduler` from `main`; this module is the
//! per-tick fan-out it calls into, plus the narrower ASG-event dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, instrument, warn};

use crate::adapters::{Service, VmAdapter, VmCloudClient};
use crate::config::{resolve_remote_account_ids, ConfigManager, EnvParameterResolver};
use crate::errors::SchedulerError;
use crate::executor::{execute, ExecutorContext, SchedulingRequest, SchedulingResult};
use crate::ice_retry::IceRetryQueue;
use crate::maintenance_window::MaintenanceWindowCache;
use crate::operation_tracker::SimpleOperationTracker;
use crate::services::AlertService;
use crate::state::ResourceStateStore;

/// In-memory snapshot of the orchestrator's last pass, shared with the
/// HTTP control surface (A1, §6.1). Not a durable log — restarting the
/// process loses it.
#[derive(Default)]
pub struct OrchestratorStatus {
    targets: RwLock<Vec<Target>>,
    last_tick: RwLock<Option<DateTime<Utc>>>,
    decisions: RwLock<HashMap<String, Vec<SchedulingResult>>>,
}

impl OrchestratorStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn targets(&self) -> Vec<Target> {
        self.targets.read().await.clone()
    }

    pub async fn last_tick(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.read().await
    }

    pub async fn decisions_for(&self, target_key: &str) -> Vec<SchedulingResult> {
        self.decisions.read().await.get(target_key).cloned().unwrap_or_default()
    }

    async fn record_tick(&self, targets: Vec<Target>) {
        *self.targets.write().await = targets;
        *self.last_tick.write().await = Some(Utc::now());
    }

    async fn record_decisions(&self, target_key: String, results: Vec<SchedulingResult>) {
        self.decisions.write().await.insert(target_key, results);
    }
}

/// One (account, region, service) target the orchestrator will dispatch a
/// scheduling request for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub account: String,
    pub region: String,
    pub service: Service,
}

/// Compute the cross product of accounts, regions and enabled services
/// from `GlobalConfig` (§4.9 step 1-2). The hub account (the account the
/// scheduler itself runs in) is included unless `hub_account_inclusion` is
/// false and it would otherwise duplicate a remote account.
pub fn compute_targets(config: &crate::config::GlobalConfig, hub_account: &str) -> Vec<Target> {
    let resolver = EnvParameterResolver;
    let mut accounts = resolve_remote_account_ids(config, &resolver);
    if config.hub_account_inclusion && !accounts.iter().any(|a| a == hub_account) {
        accounts.push(hub_account.to_string());
    }

    let services: Vec<Service> = config
        .scheduled_services
        .iter()
        .filter_map(|s| match s.as_str() {
            "vm" => Some(Service::Vm),
            "db-instance" => Some(Service::DbInstance),
            "db-cluster" => Some(Service::DbCluster),
            "asg" => Some(Service::Asg),
            other => {
                warn!(service = %other, "unknown service name in scheduled_services, skipping");
                None
            }
        })
        .collect();

    let mut targets = Vec::with_capacity(accounts.len() * config.regions.len() * services.len());
    for account in &accounts {
        for region in &config.regions {
            for service in &services {
                targets.push(Target {
                    account: account.clone(),
                    region: region.clone(),
                    service: *service,
                });
            }
        }
    }
    targets
}

/// Cross-account regional client factory (§9.1): a named collaborator
/// with a bounded contract since implementing the cloud provider APIs is
/// a Non-goal. `assume` is the only method the orchestrator needs.
pub trait AccountContext: Send + Sync {
    type RegionalClients;
    fn assume(&self, account: &str) -> Result<Self::RegionalClients, SchedulerError>;
}

/// Dispatches one `SchedulingRequest` per target, bounded by a semaphore
/// sized to `GlobalConfig::default_target_concurrency` (§5's "operator-
/// controlled concurrency cap").
pub struct Orchestrator<A: VmCloudClient + Clone + Send + Sync + 'static> {
    config_manager: Arc<ConfigManager>,
    tracker: Arc<SimpleOperationTracker>,
    state_store: Arc<ResourceStateStore>,
    alert_service: Arc<AlertService>,
    ice_queue: IceRetryQueue,
    maintenance_windows: Arc<MaintenanceWindowCache>,
    vm_client: A,
    hub_account: String,
    status: Arc<OrchestratorStatus>,
}

impl<A: VmCloudClient + Clone + Send + Sync + 'static> Orchestrator<A> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config_manager: Arc<ConfigManager>,
        tracker: Arc<SimpleOperationTracker>,
        state_store: Arc<ResourceStateStore>,
        alert_service: Arc<AlertService>,
        ice_queue: IceRetryQueue,
        maintenance_windows: Arc<MaintenanceWindowCache>,
        vm_client: A,
        hub_account: String,
        status: Arc<OrchestratorStatus>,
    ) -> Self {
        Self {
            config_manager,
            tracker,
            state_store,
            alert_service,
            ice_queue,
            maintenance_windows,
            vm_client,
            hub_account,
            status,
        }
    }

    /// The shared status handle the HTTP control surface reads from.
    pub fn status(&self) -> Arc<OrchestratorStatus> {
        self.status.clone()
    }

    /// Run one orchestration tick: enumerate targets, dispatch each
    /// asynchronously, bounded by the concurrency semaphore. Fire-and-
    /// forget per §4.9 step 3 — this call returns once every target has
    /// been *spawned*, not once every pass has finished.
    #[instrument(skip(self))]
    pub async fn run_tick(&self) {
        let config = self.config_manager.get_current_config().await;
        let targets = compute_targets(&config, &self.hub_account);
        let semaphore = Arc::new(Semaphore::new(config.default_target_concurrency.max(1)));

        info!(targets = targets.len(), "orchestrator tick dispatching targets");
        self.status.record_tick(targets.clone()).await;

        for target in targets {
            if target.service != Service::Vm {
                // Only the VM adapter has a wired cloud client in this
                // orchestrator; the other families are dispatched the same
                // way once their clients are threaded through main.
                continue;
            }
            let semaphore = semaphore.clone();
            let config_manager = self.config_manager.clone();
            let tracker = self.tracker.clone();
            let state_store = self.state_store.clone();
            let alert_service = self.alert_service.clone();
            let ice_queue = self.ice_queue.clone();
            let maintenance_windows = self.maintenance_windows.clone();
            let vm_client = self.vm_client.clone();
            let status = self.status.clone();

            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                dispatch_vm_target(
                    target,
                    config_manager,
                    tracker,
                    state_store,
                    alert_service,
                    ice_queue,
                    maintenance_windows,
                    vm_client,
                    None,
                    status,
                )
                .await;
            });
        }
    }

    /// Narrow ASG-event dispatch (§4.9 step 4): only the affected
    /// (account, region) pairs, restricted to the given schedule names.
    pub async fn dispatch_for_changed_schedules(&self, account: &str, region: &str, schedule_names: Vec<String>) {
        let target = Target {
            account: account.to_string(),
            region: region.to_string(),
            service: Service::Vm,
        };
        dispatch_vm_target(
            target,
            self.config_manager.clone(),
            self.tracker.clone(),
            self.state_store.clone(),
            self.alert_service.clone(),
            self.ice_queue.clone(),
            self.maintenance_windows.clone(),
            self.vm_client.clone(),
            Some(schedule_names),
            self.status.clone(),
        )
        .await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_vm_target<A: VmCloudClient>(
    target: Target,
    config_manager: Arc<ConfigManager>,
    tracker: Arc<SimpleOperationTracker>,
    state_store: Arc<ResourceStateStore>,
    alert_service: Arc<AlertService>,
    ice_queue: IceRetryQueue,
    maintenance_windows: Arc<MaintenanceWindowCache>,
    vm_client: A,
    schedule_names: Option<Vec<String>>,
    status: Arc<OrchestratorStatus>,
) {
    let definitions = config_manager.get_current_definitions().await;
    let adapter = VmAdapter::new(vm_client);

    let now = Utc::now();
    let request = match SchedulingRequest::new(
        &target.account,
        &target.region,
        target.service.tag_namespace(),
        &now.to_rfc3339(),
        now,
        schedule_names,
    ) {
        Ok(request) => request,
        Err(e) => {
            warn!(?target, error = %e, "failed to build scheduling request");
            return;
        }
    };

    // In the absence of a per-instance tag-to-schedule lookup wired to a
    // real cloud client, the demo path dispatches against every schedule
    // definition in turn; a production wiring would resolve the schedule
    // per instance from its tag before calling execute.
    for schedule in definitions.schedules.values() {
        let window = if schedule.use_maintenance_window {
            maintenance_windows.by_name(&target.account, &target.region, &schedule.name).await
        } else {
            None
        };
        let ctx = ExecutorContext {
            adapter: &adapter,
            tracker: &tracker,
            state_store: &state_store,
            alert_service: &alert_service,
            ice_queue: &ice_queue,
        };
        let lookup = |name: &str| definitions.periods.get(name).cloned();
        match execute(&request, schedule, lookup, window.as_ref(), &ctx).await {
            Ok(results) => status.record_decisions(request.target_key(), results).await,
            Err(e) => {
                if !matches!(e, SchedulerError::Executor(crate::errors::ExecutorError::TargetBusy { .. })) {
                    warn!(?target, schedule = %schedule.name, error = %e, "scheduling pass failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;

    #[test]
    fn cross_product_covers_every_account_region_service() {
        let config = GlobalConfig {
            scheduled_services: vec!["vm".into(), "asg".into()],
            regions: vec!["us-east-1".into(), "us-west-2".into()],
            remote_account_ids: vec!["111111111111".into()],
            hub_account_inclusion: true,
            ..GlobalConfig::default()
        };
        let targets = compute_targets(&config, "999999999999");
        assert_eq!(targets.len(), 2 /*accounts*/ * 2 /*regions*/ * 2 /*services*/);
        assert!(targets.iter().any(|t| t.account == "999999999999" && t.service == Service::Asg));
    }

    #[test]
    fn hub_account_excluded_when_flag_is_false() {
        let config = GlobalConfig {
            scheduled_services: vec!["vm".into()],
            regions: vec!["us-east-1".into()],
            remote_account_ids: vec!["111111111111".into()],
            hub_account_inclusion: false,
            ..GlobalConfig::default()
        };
        let targets = compute_targets(&config, "999999999999");
        assert!(!targets.iter().any(|t| t.account == "999999999999"));
    }

    #[test]
    fn unknown_service_name_is_skipped_not_fatal() {
        let config = GlobalConfig {
            scheduled_services: vec!["vm".into(), "made-up-service".into()],
            regions: vec!["us-east-1".into()],
            remote_account_ids: vec![],
            hub_account_inclusion: true,
            ..GlobalConfig::default()
        };
        let targets = compute_targets(&config, "999999999999");
        assert_eq!(targets.len(), 1);
    }
}
