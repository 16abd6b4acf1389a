//! VM adapter (C6): the simplest family — start/stop/resize map directly
//! onto a single cloud call each. Generic over a `VmCloudClient` so the
//! batching/decision logic here is exercised by a test fake; there is no
//! production client (implementing the cloud provider API is a
//! Non-goal).

use crate::adapters::{AbstractInstance, Service, ServiceAdapter, StopOptions};
use crate::errors::AdapterError;

pub trait VmCloudClient: Send + Sync {
    async fn describe_tagged(&self, schedule_names: Option<&[String]>) -> Result<Vec<AbstractInstance>, AdapterError>;
    async fn start_instance(&self, id: &str) -> Result<(), AdapterError>;
    async fn stop_instance(&self, id: &str, hibernate: bool) -> Result<(), AdapterError>;
    async fn resize_instance(&self, id: &str, target_size: &str) -> Result<(), AdapterError>;
}

pub struct VmAdapter<C: VmCloudClient> {
    client: C,
}

impl<C: VmCloudClient> VmAdapter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub const SERVICE: Service = Service::Vm;
}

impl<C: VmCloudClient> ServiceAdapter for VmAdapter<C> {
    async fn describe_managed_instances(
        &self,
        schedule_names: Option<&[String]>,
    ) -> Result<Vec<AbstractInstance>, AdapterError> {
        self.client.describe_tagged(schedule_names).await
    }

    async fn start(&self, instance: &AbstractInstance, _preferred_sizes: &[String]) -> Result<(), AdapterError> {
        self.client.start_instance(&instance.id).await
    }

    async fn stop(&self, instance: &AbstractInstance, options: StopOptions) -> Result<(), AdapterError> {
        self.client.stop_instance(&instance.id, options.hibernate).await
    }

    async fn resize(&self, instance: &AbstractInstance, target_size: &str) -> Result<(), AdapterError> {
        self.client.resize_instance(&instance.id, target_size).await
    }
}

/// No cloud provider client is in scope (§9.1) — this client always
/// reports zero managed instances, so a running binary has a concrete
/// `VmCloudClient` to wire the orchestrator against without claiming to
/// talk to a real cloud account.
#[derive(Debug, Clone, Default)]
pub struct NoopVmClient;

impl VmCloudClient for NoopVmClient {
    async fn describe_tagged(&self, _schedule_names: Option<&[String]>) -> Result<Vec<AbstractInstance>, AdapterError> {
        Ok(Vec::new())
    }

    async fn start_instance(&self, _id: &str) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn stop_instance(&self, _id: &str, _hibernate: bool) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn resize_instance(&self, _id: &str, _target_size: &str) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InstanceState;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeVmClient {
        instances: Vec<AbstractInstance>,
        capacity_error_for: Mutex<Vec<String>>,
        started: Mutex<Vec<String>>,
        stopped: Mutex<Vec<(String, bool)>>,
    }

    impl VmCloudClient for FakeVmClient {
        async fn describe_tagged(&self, _schedule_names: Option<&[String]>) -> Result<Vec<AbstractInstance>, AdapterError> {
            Ok(self.instances.clone())
        }

        async fn start_instance(&self, id: &str) -> Result<(), AdapterError> {
            if self.capacity_error_for.lock().unwrap().contains(&id.to_string()) {
                return Err(AdapterError::CapacityUnavailable {
                    preferred_sizes: vec!["t3.medium".into()],
                });
            }
            self.started.lock().unwrap().push(id.to_string());
            Ok(())
        }

        async fn stop_instance(&self, id: &str, hibernate: bool) -> Result<(), AdapterError> {
            self.stopped.lock().unwrap().push((id.to_string(), hibernate));
            Ok(())
        }

        async fn resize_instance(&self, _id: &str, _target_size: &str) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn instance(id: &str) -> AbstractInstance {
        AbstractInstance {
            id: id.to_string(),
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
    async fn start_surfaces_capacity_error_for_ice_retry_upstream() {
        let client = FakeVmClient {
            instances: vec![],
            capacity_error_for: Mutex::new(vec!["i-1".into()]),
            started: Mutex::new(vec![]),
            stopped: Mutex::new(vec![]),
        };
        let adapter = VmAdapter::new(client);
        let err = adapter.start(&instance("i-1"), &["t3.medium".into()]).await.unwrap_err();
        assert!(matches!(err, AdapterError::CapacityUnavailable { .. }));
    }

    #[tokio::test]
    async fn stop_forwards_hibernate_hint() {
        let client = FakeVmClient::default();
        let adapter = VmAdapter::new(client);
        adapter
            .stop(&instance("i-1"), StopOptions { hibernate: true })
            .await
            .unwrap();
        assert_eq!(adapter.client.stopped.lock().unwrap().as_slice(), &[("i-1".to_string(), true)]);
    }
}
