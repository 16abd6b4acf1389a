//! Route handlers for the A1 HTTP control surface (§6.1).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::period::Period;
use crate::schedule::Schedule;

use super::AppState;

/// CLI request envelope (§6): `{source, action, parameters}`.
#[derive(Debug, Deserialize)]
pub struct CliRequest {
    #[allow(dead_code)]
    pub source: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Admin-api result, tagged by variant so it serializes as
/// `{"<Variant>": ...}` — the PascalCase shape the CLI envelope promises.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
enum CliResult {
    Period(Period),
    Periods(Vec<Period>),
    Schedule(Schedule),
    Schedules(Vec<Schedule>),
    Deleted(bool),
    Usage(Vec<Period>),
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "Error": message.into() })))
}

fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "Error": message.into() })))
}

fn internal(message: impl Into<String>) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "Error": message.into() })))
}

fn param<T: for<'de> Deserialize<'de>>(parameters: &Value, field: &str) -> Result<T, ApiError> {
    let value = parameters
        .get(field)
        .ok_or_else(|| bad_request(format!("missing parameter '{field}'")))?;
    serde_json::from_value(value.clone()).map_err(|e| bad_request(format!("invalid parameter '{field}': {e}")))
}

/// `POST /api/cli`: dispatch the CLI request envelope to the matching
/// admin operation (§6). Mutations go through `ConfigManager` so the
/// in-memory definitions snapshot is reloaded immediately after.
pub async fn handle_cli(State(state): State<AppState>, Json(request): Json<CliRequest>) -> Result<Json<Value>, ApiError> {
    let result = match request.action.as_str() {
        "create-period" => {
            let name: String = param(&request.parameters, "name")?;
            let period: Period = serde_json::from_value(request.parameters.clone()).map_err(|e| bad_request(e.to_string()))?;
            state
                .config_manager
                .put_period(&name, period.clone(), false)
                .await
                .map_err(|e| internal(e.to_string()))?;
            CliResult::Period(period)
        }
        "update-period" => {
            let name: String = param(&request.parameters, "name")?;
            let period: Period = serde_json::from_value(request.parameters.clone()).map_err(|e| bad_request(e.to_string()))?;
            state
                .config_manager
                .put_period(&name, period.clone(), true)
                .await
                .map_err(|e| internal(e.to_string()))?;
            CliResult::Period(period)
        }
        "delete-period" => {
            let name: String = param(&request.parameters, "name")?;
            state
                .config_manager
                .delete_period(&name)
                .await
                .map_err(|e| not_found(e.to_string()))?;
            CliResult::Deleted(true)
        }
        "describe-periods" => CliResult::Periods(state.config_manager.describe_periods().await),
        "create-schedule" => {
            let name: String = param(&request.parameters, "name")?;
            let schedule: Schedule =
                serde_json::from_value(request.parameters.clone()).map_err(|e| bad_request(e.to_string()))?;
            state
                .config_manager
                .put_schedule(&name, schedule.clone(), false)
                .await
                .map_err(|e| internal(e.to_string()))?;
            CliResult::Schedule(schedule)
        }
        "update-schedule" => {
            let name: String = param(&request.parameters, "name")?;
            let schedule: Schedule =
                serde_json::from_value(request.parameters.clone()).map_err(|e| bad_request(e.to_string()))?;
            state
                .config_manager
                .put_schedule(&name, schedule.clone(), true)
                .await
                .map_err(|e| internal(e.to_string()))?;
            CliResult::Schedule(schedule)
        }
        "delete-schedule" => {
            let name: String = param(&request.parameters, "name")?;
            state
                .config_manager
                .delete_schedule(&name)
                .await
                .map_err(|e| not_found(e.to_string()))?;
            CliResult::Deleted(true)
        }
        "describe-schedules" => CliResult::Schedules(state.config_manager.describe_schedules().await),
        "describe-schedule-usage" => {
            let name: String = param(&request.parameters, "name")?;
            let usage = state
                .config_manager
                .describe_schedule_usage(&name)
                .await
                .ok_or_else(|| not_found(format!("schedule '{name}' not found")))?;
            CliResult::Usage(usage)
        }
        other => return Err(bad_request(format!("unknown CLI action '{other}'"))),
    };

    Ok(Json(serde_json::to_value(result).expect("CliResult always serializes")))
}

#[derive(Debug, Serialize)]
pub struct TargetStatus {
    pub account: String,
    pub region: String,
    pub service: String,
    pub target_key: String,
    pub busy: bool,
}

/// `GET /api/targets`: the orchestrator's last-computed targets, annotated
/// with busy/idle from the operation tracker.
pub async fn list_targets(State(state): State<AppState>) -> Json<Vec<TargetStatus>> {
    let targets = state.status.targets().await;
    let mut statuses = Vec::with_capacity(targets.len());
    for target in targets {
        let target_key = format!("{}:{}:{}", target.account, target.region, target.service.tag_namespace());
        let busy = state.tracker.is_busy(&target_key).await;
        statuses.push(TargetStatus {
            account: target.account,
            region: target.region,
            service: target.service.tag_namespace().to_string(),
            target_key,
            busy,
        });
    }
    Json(statuses)
}

/// `GET /api/targets/{account}/{region}/{service}/decisions`: the most
/// recent `SchedulingResult` list for that target, in-memory only.
pub async fn target_decisions(
    State(state): State<AppState>,
    Path((account, region, service)): Path<(String, String, String)>,
) -> Json<Value> {
    let target_key = format!("{account}:{region}:{service}");
    let decisions = state.status.decisions_for(&target_key).await;
    Json(json!({ "target_key": target_key, "decisions": decisions }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub store_reachable: bool,
    pub last_tick: Option<String>,
    pub target_count: usize,
    pub busy_target_count: usize,
}

/// `GET /api/health`: liveness/readiness.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // `get_current_config` only ever fails to reach the store during
    // `ConfigManager::new`; once constructed, a read is an in-memory
    // `Arc` clone, so reachability here tracks "has the process started
    // successfully" rather than a live round-trip to the backing store.
    let _config = state.config_manager.get_current_config().await;
    let targets = state.status.targets().await;
    let operation_status = state.tracker.get_operation_status().await;
    Json(HealthResponse {
        store_reachable: true,
        last_tick: state.status.last_tick().await.map(|t| t.to_rfc3339()),
        target_count: targets.len(),
        busy_target_count: operation_status.total_active,
    })
}
