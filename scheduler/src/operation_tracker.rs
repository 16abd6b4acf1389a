//! Operation tracking (A2): enforces the "at-most-one-active-pass per
//! target" invariant (§4.8) — a `target_key -> ActiveOperation`
//! map, `try_start_operation`/`finish_operation` guarding the critical
//! section, and a time-based cleanup sweep for passes that never called
//! `finish_operation` (e.g. the process was killed mid-pass).
//!
//! # Usage
//!
//! ```ignore
//! tracker.try_start_operation("111111111111:us-east-1:vm", "scheduling-pass").await?;
//! // ... run the pass ...
//! tracker.finish_operation("111111111111:us-east-1:vm").await;
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::errors::ExecutorError;

#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    pub operation_type: String,
    pub target_key: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationStatus {
    pub busy_targets: HashMap<String, ActiveOperation>,
    pub total_active: usize,
}

pub struct SimpleOperationTracker {
    active_operations: Arc<RwLock<HashMap<String, ActiveOperation>>>,
}

impl SimpleOperationTracker {
    pub fn new() -> Self {
        Self {
            active_operations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Try to start an operation on a target. Returns `TargetBusy` if the
    /// target already has a scheduling pass in flight; the caller is
    /// expected to reject the request immediately rather than queue, per
    /// §4.8 ("a subsequent timer tick will simply try again").
    #[instrument(skip(self), fields(target = %target_key, operation = %operation_type))]
    pub async fn try_start_operation(
        &self,
        target_key: &str,
        operation_type: &str,
    ) -> Result<(), ExecutorError> {
        let mut active = self.active_operations.write().await;

        if active.contains_key(target_key) {
            return Err(ExecutorError::TargetBusy {
                target: target_key.to_string(),
            });
        }

        active.insert(
            target_key.to_string(),
            ActiveOperation {
                operation_type: operation_type.to_string(),
                target_key: target_key.to_string(),
                started_at: Utc::now(),
            },
        );
        info!("started '{}' on {}", operation_type, target_key);
        Ok(())
    }

    /// Mark an operation as finished. Must run on every exit path
    /// (success, per-target error, panic caught by a guard) so a failed
    /// pass does not permanently wedge its target.
    #[instrument(skip(self), fields(target = %target_key))]
    pub async fn finish_operation(&self, target_key: &str) {
        let mut active = self.active_operations.write().await;
        if let Some(op) = active.remove(target_key) {
            let duration = Utc::now().signed_duration_since(op.started_at);
            info!(
                "finished '{}' on {} (took {}s)",
                op.operation_type,
                target_key,
                duration.num_seconds()
            );
        }
    }

    pub async fn get_operation_status(&self) -> OperationStatus {
        let active = self.active_operations.read().await;
        OperationStatus {
            busy_targets: active.clone(),
            total_active: active.len(),
        }
    }

    pub async fn is_busy(&self, target_key: &str) -> bool {
        self.active_operations.read().await.contains_key(target_key)
    }

    /// Force-clean operations older than `max_hours` (stuck passes from a
    /// crashed worker). Run on a fixed interval from `main`.
    pub async fn cleanup_old_operations(&self, max_hours: i64) -> u32 {
        let mut active = self.active_operations.write().await;
        let cutoff = Utc::now() - chrono::Duration::hours(max_hours);
        let initial_count = active.len();

        active.retain(|target_key, operation| {
            let should_keep = operation.started_at > cutoff;
            if !should_keep {
                warn!(
                    "cleaned up stuck operation '{}' on {} (running for {}h)",
                    operation.operation_type,
                    target_key,
                    Utc::now().signed_duration_since(operation.started_at).num_hours()
                );
            }
            should_keep
        });

        (initial_count - active.len()) as u32
    }
}

impl Default for SimpleOperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SimpleOperationTracker {
    fn clone(&self) -> Self {
        Self {
            active_operations: self.active_operations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_concurrent_pass_on_same_target() {
        let tracker = SimpleOperationTracker::new();
        tracker
            .try_start_operation("acct:region:vm", "scheduling-pass")
            .await
            .unwrap();
        assert!(tracker.is_busy("acct:region:vm").await);

        let err = tracker
            .try_start_operation("acct:region:vm", "scheduling-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::TargetBusy { .. }));

        tracker.finish_operation("acct:region:vm").await;
        assert!(!tracker.is_busy("acct:region:vm").await);
        assert!(tracker
            .try_start_operation("acct:region:vm", "scheduling-pass")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn tracks_multiple_independent_targets() {
        let tracker = SimpleOperationTracker::new();
        tracker.try_start_operation("a:us-east-1:vm", "scheduling-pass").await.unwrap();
        tracker.try_start_operation("a:us-west-2:vm", "scheduling-pass").await.unwrap();

        let status = tracker.get_operation_status().await;
        assert_eq!(status.total_active, 2);
    }

    #[tokio::test]
    async fn cleanup_removes_only_stuck_entries() {
        let tracker = SimpleOperationTracker::new();
        tracker.try_start_operation("acct:region:vm", "scheduling-pass").await.unwrap();
        let cleaned = tracker.cleanup_old_operations(24).await;
        assert_eq!(cleaned, 0);
        assert!(tracker.is_busy("acct:region:vm").await);
    }
}
