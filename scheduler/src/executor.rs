//! Scheduling-request executor (C8): for one (account, region, service)
//! target, loads definitions, enumerates managed instances, computes a
//! decision per instance (C7), applies it through the adapter, and
//! persists updated resource-state memory. Wrapped by the at-most-one-
//! active-pass guard (A2), start/finish bracketing the whole pass like a
//! try/finally.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::adapters::{AbstractInstance, ServiceAdapter, StopOptions};
use crate::decision::{self, Action, SchedulingDecision};
use crate::errors::{ExecutorError, SchedulerError};
use crate::ice_retry::{IceRetryMessage, IceRetryQueue};
use crate::maintenance_window::MaintenanceWindow;
use crate::operation_tracker::SimpleOperationTracker;
use crate::period::Period;
use crate::schedule::Schedule;
use crate::services::AlertService;
use crate::state::{ResourceStateRecord, ResourceStateStore, StoredState};

/// One scheduling-request envelope (§6): a target plus the wall-clock
/// timestamp to evaluate at.
#[derive(Debug, Clone)]
pub struct SchedulingRequest {
    pub account: String,
    pub region: String,
    pub service: String,
    pub current_dt: DateTime<FixedOffset>,
    pub dispatch_time: DateTime<Utc>,
    pub schedule_names: Option<Vec<String>>,
}

impl SchedulingRequest {
    /// Parse `current_dt` from an RFC3339 string carrying an explicit UTC
    /// offset, rejecting naive/offset-less timestamps per §4.8.
    pub fn new(
        account: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
        current_dt_rfc3339: &str,
        dispatch_time: DateTime<Utc>,
        schedule_names: Option<Vec<String>>,
    ) -> Result<Self, ExecutorError> {
        let current_dt =
            DateTime::parse_from_rfc3339(current_dt_rfc3339).map_err(|_| ExecutorError::NotTimezoneAware)?;
        Ok(Self {
            account: account.into(),
            region: region.into(),
            service: service.into(),
            current_dt,
            dispatch_time,
            schedule_names,
        })
    }

    pub fn target_key(&self) -> String {
        format!("{}:{}:{}", self.account, self.region, self.service)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    StartFailed,
    StopFailed,
    ConfigurationFailed,
    UnknownError,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulingResult {
    pub instance_id: String,
    pub requested_action: Action,
    pub action_taken: bool,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
}

impl SchedulingResult {
    fn do_nothing(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            requested_action: Action::DoNothing,
            action_taken: false,
            error_code: None,
            error_message: None,
        }
    }
}

/// Collaborators an executor pass needs beyond the request itself. Kept
/// as a bag of references rather than threading six parameters through
/// every call.
pub struct ExecutorContext<'a, A: ServiceAdapter> {
    pub adapter: &'a A,
    pub tracker: &'a SimpleOperationTracker,
    pub state_store: &'a ResourceStateStore,
    pub alert_service: &'a AlertService,
    pub ice_queue: &'a IceRetryQueue,
}

/// Run one scheduling pass for `request`. `lookup_period` resolves a
/// period name to its definition; `active_maintenance_window` is the
/// window (if any) relevant to this schedule, already resolved by the
/// caller from the maintenance-window cache (§4.10).
#[instrument(skip(ctx, schedule, lookup_period, active_maintenance_window), fields(target = %request.target_key()))]
pub async fn execute<A, F>(
    request: &SchedulingRequest,
    schedule: &Schedule,
    lookup_period: F,
    active_maintenance_window: Option<&MaintenanceWindow>,
    ctx: &ExecutorContext<'_, A>,
) -> Result<Vec<SchedulingResult>, SchedulerError>
where
    A: ServiceAdapter,
    F: Fn(&str) -> Option<Period> + Copy,
{
    let target_key = request.target_key();

    if let Err(e) = ctx.tracker.try_start_operation(&target_key, "scheduling-pass").await {
        warn!(target = %target_key, "rejecting request, scheduling pass already in flight");
        return Err(SchedulerError::Executor(e));
    }

    let result = run_pass(request, schedule, lookup_period, active_maintenance_window, ctx).await;
    ctx.tracker.finish_operation(&target_key).await;

    match &result {
        Ok(_) => {
            let _ = ctx.alert_service.alert_pass_recovered(&target_key).await;
        }
        Err(e) => {
            let _ = ctx.alert_service.alert_pass_failed(&target_key, &e.to_string()).await;
        }
    }
    result
}

async fn run_pass<A, F>(
    request: &SchedulingRequest,
    schedule: &Schedule,
    lookup_period: F,
    active_maintenance_window: Option<&MaintenanceWindow>,
    ctx: &ExecutorContext<'_, A>,
) -> Result<Vec<SchedulingResult>, SchedulerError>
where
    A: ServiceAdapter,
    F: Fn(&str) -> Option<Period> + Copy,
{
    let ts = request.current_dt.with_timezone(&Utc);

    let mut state_map = ctx
        .state_store
        .load(&request.service, &request.account, &request.region)
        .await?;

    let instances = ctx
        .adapter
        .describe_managed_instances(request.schedule_names.as_deref())
        .await
        .map_err(|e| {
            SchedulerError::Executor(ExecutorError::EnumerationFailed {
                reason: e.to_string(),
            })
        })?;

    let mut results = Vec::with_capacity(instances.len());
    for instance in &instances {
        let stored = state_map
            .get(&instance.id)
            .cloned()
            .unwrap_or_else(ResourceStateRecord::unseen);

        let decision = decision::decide(
            schedule,
            &ts,
            lookup_period,
            active_maintenance_window,
            instance,
            &stored,
        );

        let result = apply_decision(ctx, request, instance, &decision).await;
        state_map.insert(
            instance.id.clone(),
            ResourceStateRecord {
                stored_state: decision.new_stored_state,
                last_seen_size: instance.instance_type.clone(),
                resize_target: match &decision.action {
                    Action::Resize(size) => Some(size.clone()),
                    _ => stored.resize_target.clone(),
                },
                last_action_time: Some(Utc::now()),
            },
        );
        results.push(result);
    }

    ctx.state_store
        .save(&request.service, &request.account, &request.region, state_map)
        .await?;

    info!(
        target = %request.target_key(),
        instances = instances.len(),
        "scheduling pass complete"
    );

    Ok(results)
}

async fn apply_decision<A: ServiceAdapter>(
    ctx: &ExecutorContext<'_, A>,
    request: &SchedulingRequest,
    instance: &AbstractInstance,
    decision: &SchedulingDecision,
) -> SchedulingResult {
    match &decision.action {
        Action::DoNothing => SchedulingResult::do_nothing(&instance.id),
        Action::Start => match ctx.adapter.start(instance, &instance.preferred_instance_types()).await {
            Ok(()) => taken(instance, decision),
            Err(e) if matches!(e, crate::errors::AdapterError::CapacityUnavailable { .. }) => {
                let preferred = instance.preferred_instance_types();
                if !preferred.is_empty() {
                    ctx.ice_queue.enqueue(IceRetryMessage {
                        account: request.account.clone(),
                        region: request.region.clone(),
                        instance_id: instance.id.clone(),
                        preferred_instance_types: preferred.clone(),
                    });
                    let _ = ctx
                        .alert_service
                        .alert_insufficient_capacity(&instance.id, &instance.id, &preferred)
                        .await;
                }
                failed(instance, decision, ErrorCode::StartFailed, e.to_string())
            }
            Err(e) => failed(instance, decision, ErrorCode::StartFailed, e.to_string()),
        },
        Action::Stop => match ctx.adapter.stop(instance, StopOptions::default()).await {
            Ok(()) => taken(instance, decision),
            Err(e) => failed(instance, decision, ErrorCode::StopFailed, e.to_string()),
        },
        Action::Hibernate => match ctx.adapter.stop(instance, StopOptions { hibernate: true }).await {
            Ok(()) => taken(instance, decision),
            Err(e) => failed(instance, decision, ErrorCode::StopFailed, e.to_string()),
        },
        Action::Resize(size) => match ctx.adapter.resize(instance, size).await {
            Ok(()) => taken(instance, decision),
            Err(e) => failed(instance, decision, ErrorCode::ConfigurationFailed, e.to_string()),
        },
    }
}

fn taken(instance: &AbstractInstance, decision: &SchedulingDecision) -> SchedulingResult {
    SchedulingResult {
        instance_id: instance.id.clone(),
        requested_action: decision.action.clone(),
        action_taken: true,
        error_code: None,
        error_message: None,
    }
}

fn failed(instance: &AbstractInstance, decision: &SchedulingDecision, code: ErrorCode, message: String) -> SchedulingResult {
    SchedulingResult {
        instance_id: instance.id.clone(),
        requested_action: decision.action.clone(),
        action_taken: false,
        error_code: Some(code),
        error_message: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InstanceState;
    use crate::errors::AdapterError;
    use crate::schedule::{OverrideStatus, PeriodRef};
    use sqlx::SqlitePool;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeAdapter {
        instances: Vec<AbstractInstance>,
        start_calls: Mutex<Vec<String>>,
    }

    impl ServiceAdapter for FakeAdapter {
        async fn describe_managed_instances(
            &self,
            _schedule_names: Option<&[String]>,
        ) -> Result<Vec<AbstractInstance>, AdapterError> {
            Ok(self.instances.clone())
        }
        async fn start(&self, instance: &AbstractInstance, _preferred_sizes: &[String]) -> Result<(), AdapterError> {
            self.start_calls.lock().unwrap().push(instance.id.clone());
            Ok(())
        }
        async fn stop(&self, _instance: &AbstractInstance, _options: StopOptions) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn resize(&self, _instance: &AbstractInstance, _target_size: &str) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn always_running_schedule() -> Schedule {
        Schedule {
            name: "always-on".into(),
            timezone: "UTC".into(),
            periods: vec![PeriodRef {
                period_name: "all-day".into(),
                instance_size: None,
            }],
            override_status: OverrideStatus::None,
            stop_new_instances: true,
            enforced: false,
            hibernate: false,
            retain_running: false,
            use_maintenance_window: false,
            ssm_maintenance_window: vec![],
            description: None,
            configured_in_stack: None,
        }
    }

    fn lookup(name: &str) -> Option<Period> {
        if name == "all-day" {
            Some(Period::always_running("all-day"))
        } else {
            None
        }
    }

    fn stopped_instance() -> AbstractInstance {
        AbstractInstance {
            id: "i-1".into(),
            name: None,
            schedule_name: Some("always-on".into()),
            current_state: InstanceState::Stopped,
            instance_type: Some("t3.micro".into()),
            tags: HashMap::new(),
            maintenance_windows: vec![],
            is_resizable: true,
        }
    }

    #[tokio::test]
    async fn executes_a_pass_and_starts_stopped_instance() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let state_store = ResourceStateStore::new(pool).await.unwrap();
        let tracker = SimpleOperationTracker::new();
        let alert_service = AlertService::new(String::new());
        let (ice_queue, _receiver) = IceRetryQueue::new();
        let adapter = FakeAdapter {
            instances: vec![stopped_instance()],
            start_calls: Mutex::new(Vec::new()),
        };
        let ctx = ExecutorContext {
            adapter: &adapter,
            tracker: &tracker,
            state_store: &state_store,
            alert_service: &alert_service,
            ice_queue: &ice_queue,
        };

        let request = SchedulingRequest::new(
            "111111111111",
            "us-east-1",
            "vm",
            "2026-07-27T10:00:00+00:00",
            Utc::now(),
            None,
        )
        .unwrap();

        let schedule = always_running_schedule();
        let results = execute(&request, &schedule, lookup, None, &ctx).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].requested_action, Action::Start);
        assert!(results[0].action_taken);
        assert_eq!(adapter.start_calls.lock().unwrap().len(), 1);
        assert!(!tracker.is_busy(&request.target_key()).await);
    }

    #[tokio::test]
    async fn concurrent_request_on_same_target_is_rejected() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let state_store = ResourceStateStore::new(pool).await.unwrap();
        let tracker = SimpleOperationTracker::new();
        tracker.try_start_operation("111111111111:us-east-1:vm", "scheduling-pass").await.unwrap();
        let alert_service = AlertService::new(String::new());
        let (ice_queue, _receiver) = IceRetryQueue::new();
        let adapter = FakeAdapter {
            instances: vec![],
            start_calls: Mutex::new(Vec::new()),
        };
        let ctx = ExecutorContext {
            adapter: &adapter,
            tracker: &tracker,
            state_store: &state_store,
            alert_service: &alert_service,
            ice_queue: &ice_queue,
        };
        let request = SchedulingRequest::new(
            "111111111111",
            "us-east-1",
            "vm",
            "2026-07-27T10:00:00+00:00",
            Utc::now(),
            None,
        )
        .unwrap();
        let schedule = always_running_schedule();
        let err = execute(&request, &schedule, lookup, None, &ctx).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Executor(ExecutorError::TargetBusy { .. })));
    }

    #[test]
    fn rejects_naive_current_dt() {
        let err = SchedulingRequest::new(
            "111111111111",
            "us-east-1",
            "vm",
            "not-a-timestamp",
            Utc::now(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ExecutorError::NotTimezoneAware));
    }
}
