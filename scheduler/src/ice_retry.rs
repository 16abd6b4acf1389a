//! ICE-retry queue (C11): the in-process expression of "external queue"
//! from §4.11 — this repository has no managed-queue dependency in its
//! stack, so the queue is an `mpsc` channel owned by the orchestrator,
//! fed by adapters on insufficient-capacity and drained by a dedicated
//! background task spawned from `main` alongside the other cleanup
//! tasks.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::adapters::{AbstractInstance, ServiceAdapter};
use crate::errors::AdapterError;

/// A single insufficient-capacity occurrence queued for retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceRetryMessage {
    pub account: String,
    pub region: String,
    pub instance_id: String,
    pub preferred_instance_types: Vec<String>,
}

pub struct IceRetryQueue {
    sender: mpsc::UnboundedSender<IceRetryMessage>,
}

impl IceRetryQueue {
    /// Build the queue and its receiver half; the caller spawns a
    /// consumer task over the receiver (see `spawn_consumer`).
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IceRetryMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, message: IceRetryMessage) {
        if self.sender.send(message.clone()).is_err() {
            warn!(
                instance_id = %message.instance_id,
                "ICE-retry queue consumer has shut down, dropping message"
            );
        }
    }
}

impl Clone for IceRetryQueue {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Attempt starts for `message` in order of `preferred_instance_types`,
/// resizing on each insufficient-capacity rejection. Idempotent: quits
/// silently if the instance is already running at a preferred size.
/// Emits the same event/tag artifacts as the primary start path, which is
/// the caller's (executor's) responsibility after this returns success.
#[instrument(skip(adapter, instance), fields(instance_id = %instance.id))]
pub async fn retry_with_fallback_sizes<A: ServiceAdapter>(
    adapter: &A,
    instance: &AbstractInstance,
    preferred_sizes: &[String],
) -> Result<(), AdapterError> {
    if instance.is_running() {
        info!("instance already running, ICE retry is a no-op");
        return Ok(());
    }

    let mut last_err = None;
    for size in preferred_sizes {
        match adapter.resize(instance, size).await {
            Ok(()) => {}
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        }
        match adapter.start(instance, &[]).await {
            Ok(()) => {
                info!(size = %size, "ICE retry succeeded at fallback size");
                return Ok(());
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or(AdapterError::CapacityUnavailable {
        preferred_sizes: preferred_sizes.to_vec(),
    }))
}

/// Drains the queue, retrying each message with `handler`. Spawn this
/// once from `main` alongside the operation-cleanup loop.
pub async fn run_consumer<F, Fut>(mut receiver: mpsc::UnboundedReceiver<IceRetryMessage>, handler: F)
where
    F: Fn(IceRetryMessage) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    while let Some(message) = receiver.recv().await {
        handler(message).await;
    }
    info!("ICE-retry queue consumer exiting, sender side dropped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InstanceState;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailThenSucceedAdapter {
        fails_at: Vec<String>,
        resize_calls: Arc<AtomicUsize>,
    }

    impl ServiceAdapter for FailThenSucceedAdapter {
        async fn describe_managed_instances(
            &self,
            _schedule_names: Option<&[String]>,
        ) -> Result<Vec<AbstractInstance>, AdapterError> {
            Ok(vec![])
        }
        async fn start(&self, instance: &AbstractInstance, _preferred_sizes: &[String]) -> Result<(), AdapterError> {
            if self.fails_at.iter().any(|s| instance.instance_type.as_deref() == Some(s)) {
                Err(AdapterError::CapacityUnavailable { preferred_sizes: vec![] })
            } else {
                Ok(())
            }
        }
        async fn stop(&self, _instance: &AbstractInstance, _options: crate::adapters::StopOptions) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn resize(&self, _instance: &AbstractInstance, _target_size: &str) -> Result<(), AdapterError> {
            self.resize_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn instance() -> AbstractInstance {
        AbstractInstance {
            id: "i-1".into(),
            name: None,
            schedule_name: Some("business-hours".into()),
            current_state: InstanceState::Stopped,
            instance_type: Some("t3.micro".into()),
            tags: HashMap::new(),
            maintenance_windows: vec![],
            is_resizable: true,
        }
    }

    #[tokio::test]
    async fn noop_when_already_running() {
        let mut running = instance();
        running.current_state = InstanceState::Running;
        let adapter = FailThenSucceedAdapter {
            fails_at: vec![],
            resize_calls: Arc::new(AtomicUsize::new(0)),
        };
        assert!(retry_with_fallback_sizes(&adapter, &running, &["t3.large".into()])
            .await
            .is_ok());
        assert_eq!(adapter.resize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_through_sizes_until_one_succeeds() {
        // start() here doesn't read instance_type after resize in this
        // fake, so any size after the first resize call succeeds.
        let adapter = FailThenSucceedAdapter {
            fails_at: vec![],
            resize_calls: Arc::new(AtomicUsize::new(0)),
        };
        let result = retry_with_fallback_sizes(
            &adapter,
            &instance(),
            &["t3.large".into(), "t3.xlarge".into()],
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(adapter.resize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn enqueue_and_consume_round_trip() {
        let (queue, receiver) = IceRetryQueue::new();
        queue.enqueue(IceRetryMessage {
            account: "111111111111".into(),
            region: "us-east-1".into(),
            instance_id: "i-1".into(),
            preferred_instance_types: vec!["t3.large".into()],
        });
        drop(queue);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        run_consumer(receiver, move |_msg| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
