// File: scheduler/src/services/alert_service.rs
//! Webhook-based alerting for scheduling-pass failures and ICE events,
//! with progressive rate-limiting: the first failure on a target alerts
//! immediately, subsequent alerts for the same still-failing target are
//! rate-limited to `REPEAT_ALERT_INTERVAL_HOURS`, and recovery sends a
//! single follow-up once the target succeeds again.

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::constants::alerts;

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    SchedulingPassFailed,
    InsufficientCapacity,
    AdapterPermissionDenied,
    MaintenanceWindowSyncFailed,
}

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertSeverity {
    Critical,
    Warning,
    Recovery,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub target_key: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct AlertState {
    last_alert_sent: DateTime<Utc>,
    has_sent_alert: bool,
}

pub struct AlertService {
    webhook_url: String,
    client: Client,
    alert_states: Arc<Mutex<HashMap<String, AlertState>>>,
    is_enabled: bool,
}

impl AlertService {
    pub fn new(webhook_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(alerts::WEBHOOK_TIMEOUT_SECONDS))
            .build()
            .expect("failed to build HTTP client for AlertService");

        let is_enabled = !webhook_url.trim().is_empty();
        if is_enabled {
            info!("AlertService initialized with webhook URL: {}", webhook_url);
        } else {
            warn!("AlertService initialized without a webhook URL - alerts are disabled");
        }

        Self {
            webhook_url: webhook_url.trim().to_string(),
            client,
            alert_states: Arc::new(Mutex::new(HashMap::new())),
            is_enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    /// Report a scheduling-pass failure for a target, rate-limited so a
    /// target stuck failing every tick does not page on every tick.
    pub async fn alert_pass_failed(&self, target_key: &str, reason: &str) -> Result<()> {
        let should_send = self.should_send_for_failure(target_key).await;
        if !should_send {
            return Ok(());
        }

        self.send_webhook(&AlertPayload {
            timestamp: Utc::now(),
            alert_type: AlertType::SchedulingPassFailed,
            severity: AlertSeverity::Critical,
            target_key: target_key.to_string(),
            message: format!("scheduling pass failed for {target_key}: {reason}"),
            details: Some(serde_json::json!({ "reason": reason })),
        })
        .await
    }

    /// Report that a target's scheduling pass succeeded after previously
    /// having alerted a failure — sends a single recovery notification.
    pub async fn alert_pass_recovered(&self, target_key: &str) -> Result<()> {
        let had_alerted = {
            let mut states = self.alert_states.lock().await;
            states.remove(target_key).map(|s| s.has_sent_alert).unwrap_or(false)
        };
        if !had_alerted {
            return Ok(());
        }

        self.send_webhook(&AlertPayload {
            timestamp: Utc::now(),
            alert_type: AlertType::SchedulingPassFailed,
            severity: AlertSeverity::Recovery,
            target_key: target_key.to_string(),
            message: format!("scheduling pass recovered for {target_key}"),
            details: None,
        })
        .await
    }

    /// Report an instance that failed to start on insufficient capacity
    /// and was enqueued for ICE retry (§4.11). Always sent immediately —
    /// not rate-limited, since each occurrence names a different instance.
    pub async fn alert_insufficient_capacity(
        &self,
        target_key: &str,
        instance_id: &str,
        preferred_sizes: &[String],
    ) -> Result<()> {
        self.send_webhook(&AlertPayload {
            timestamp: Utc::now(),
            alert_type: AlertType::InsufficientCapacity,
            severity: AlertSeverity::Warning,
            target_key: target_key.to_string(),
            message: format!("insufficient capacity starting {instance_id}, queued for ICE retry"),
            details: Some(serde_json::json!({
                "instance_id": instance_id,
                "preferred_sizes": preferred_sizes,
            })),
        })
        .await
    }

    pub async fn alert_permission_denied(&self, target_key: &str, reason: &str) -> Result<()> {
        self.send_webhook(&AlertPayload {
            timestamp: Utc::now(),
            alert_type: AlertType::AdapterPermissionDenied,
            severity: AlertSeverity::Critical,
            target_key: target_key.to_string(),
            message: format!("role assumption/permission denied for {target_key}: {reason}"),
            details: None,
        })
        .await
    }

    async fn should_send_for_failure(&self, target_key: &str) -> bool {
        let mut states = self.alert_states.lock().await;
        let now = Utc::now();

        match states.get_mut(target_key) {
            None => {
                states.insert(
                    target_key.to_string(),
                    AlertState {
                        last_alert_sent: now,
                        has_sent_alert: true,
                    },
                );
                true
            }
            Some(state) => {
                let hours_since_last = now.signed_duration_since(state.last_alert_sent).num_hours();
                if hours_since_last >= alerts::REPEAT_ALERT_INTERVAL_HOURS {
                    state.last_alert_sent = now;
                    state.has_sent_alert = true;
                    true
                } else {
                    debug!(
                        "target {} still failing but not yet time for a repeat alert",
                        target_key
                    );
                    false
                }
            }
        }
    }

    async fn send_webhook(&self, payload: &AlertPayload) -> Result<()> {
        if !self.is_enabled {
            warn!(
                "alert service disabled, webhook URL not configured; alert would be: {} - {}",
                payload.target_key, payload.message
            );
            return Ok(());
        }

        info!(
            "sending alert for {}: {:?} to {}",
            payload.target_key, payload.alert_type, self.webhook_url
        );

        match timeout(
            Duration::from_secs(alerts::WEBHOOK_TIMEOUT_SECONDS),
            self.client
                .post(&self.webhook_url)
                .header("Content-Type", "application/json")
                .json(payload)
                .send(),
        )
        .await
        {
            Ok(Ok(response)) => {
                if response.status().is_success() {
                    info!("alert sent for {} (status: {})", payload.target_key, response.status());
                } else {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "failed to read response body".to_string());
                    error!("alert webhook returned {} for {}: {}", status, payload.target_key, body);
                }
                Ok(())
            }
            Ok(Err(e)) => {
                error!("failed to send alert webhook for {}: {}", payload.target_key, e);
                Err(e.into())
            }
            Err(_) => {
                error!("alert webhook timed out for {}", payload.target_key);
                Err(anyhow::anyhow!("alert webhook timed out"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_service_does_not_error_on_send() {
        let service = AlertService::new(String::new());
        assert!(!service.is_enabled());
        assert!(service.alert_pass_failed("acct:region:vm", "boom").await.is_ok());
    }

    #[tokio::test]
    async fn repeat_failure_is_rate_limited() {
        let service = AlertService::new(String::new());
        assert!(service.should_send_for_failure("acct:region:vm").await);
        assert!(!service.should_send_for_failure("acct:region:vm").await);
    }

    #[tokio::test]
    async fn recovery_without_prior_alert_is_noop() {
        let service = AlertService::new(String::new());
        assert!(service.alert_pass_recovered("acct:region:vm").await.is_ok());
    }
}
