//! Managed DB instance adapter (C6): stop optionally takes a snapshot
//! first; cluster members are filtered out of the managed set regardless
//! of tag, since cluster membership is scheduled at the cluster level
//! only (see `db_cluster`).

use crate::adapters::{AbstractInstance, Service, ServiceAdapter, StopOptions};
use crate::errors::AdapterError;

pub trait DbInstanceCloudClient: Send + Sync {
    async fn describe_tagged(&self, schedule_names: Option<&[String]>) -> Result<Vec<AbstractInstance>, AdapterError>;
    async fn start_instance(&self, id: &str) -> Result<(), AdapterError>;
    async fn stop_instance(&self, id: &str) -> Result<(), AdapterError>;
    async fn resize_instance(&self, id: &str, target_size: &str) -> Result<(), AdapterError>;
    async fn create_snapshot(&self, instance_id: &str, snapshot_name: &str) -> Result<(), AdapterError>;
}

pub struct DbInstanceAdapter<C: DbInstanceCloudClient> {
    client: C,
    create_rds_snapshot: bool,
    stack_name: String,
}

impl<C: DbInstanceCloudClient> DbInstanceAdapter<C> {
    pub fn new(client: C, create_rds_snapshot: bool, stack_name: impl Into<String>) -> Self {
        Self {
            client,
            create_rds_snapshot,
            stack_name: stack_name.into(),
        }
    }

    pub const SERVICE: Service = Service::DbInstance;

    fn snapshot_name(&self, instance_id: &str) -> String {
        format!("{}-stopped-{}", self.stack_name, instance_id)
    }
}

impl<C: DbInstanceCloudClient> ServiceAdapter for DbInstanceAdapter<C> {
    async fn describe_managed_instances(
        &self,
        schedule_names: Option<&[String]>,
    ) -> Result<Vec<AbstractInstance>, AdapterError> {
        let all = self.client.describe_tagged(schedule_names).await?;
        Ok(all
            .into_iter()
            .filter(|instance| !instance.tags.contains_key("DBClusterIdentifier"))
            .collect())
    }

    async fn start(&self, instance: &AbstractInstance, _preferred_sizes: &[String]) -> Result<(), AdapterError> {
        self.client.start_instance(&instance.id).await
    }

    async fn stop(&self, instance: &AbstractInstance, _options: StopOptions) -> Result<(), AdapterError> {
        if self.create_rds_snapshot {
            self.client
                .create_snapshot(&instance.id, &self.snapshot_name(&instance.id))
                .await?;
        }
        self.client.stop_instance(&instance.id).await
    }

    async fn resize(&self, instance: &AbstractInstance, target_size: &str) -> Result<(), AdapterError> {
        self.client.resize_instance(&instance.id, target_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InstanceState;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDbInstanceClient {
        instances: Vec<AbstractInstance>,
        snapshots_taken: Mutex<Vec<String>>,
    }

    impl DbInstanceCloudClient for FakeDbInstanceClient {
        async fn describe_tagged(&self, _schedule_names: Option<&[String]>) -> Result<Vec<AbstractInstance>, AdapterError> {
            Ok(self.instances.clone())
        }
        async fn start_instance(&self, _id: &str) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn stop_instance(&self, _id: &str) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn resize_instance(&self, _id: &str, _target_size: &str) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn create_snapshot(&self, _instance_id: &str, snapshot_name: &str) -> Result<(), AdapterError> {
            self.snapshots_taken.lock().unwrap().push(snapshot_name.to_string());
            Ok(())
        }
    }

    fn instance(id: &str, in_cluster: bool) -> AbstractInstance {
        let mut tags = HashMap::new();
        if in_cluster {
            tags.insert("DBClusterIdentifier".to_string(), "prod-cluster".to_string());
        }
        AbstractInstance {
            id: id.to_string(),
            name: None,
            schedule_name: Some("business-hours".into()),
            current_state: InstanceState::Running,
            instance_type: Some("db.t3.medium".into()),
            tags,
            maintenance_windows: vec![],
            is_resizable: true,
        }
    }

    #[tokio::test]
    async fn cluster_members_are_excluded_regardless_of_tag() {
        let client = FakeDbInstanceClient {
            instances: vec![instance("i-standalone", false), instance("i-member", true)],
            ..Default::default()
        };
        let adapter = DbInstanceAdapter::new(client, false, "my-stack");
        let described = adapter.describe_managed_instances(None).await.unwrap();
        assert_eq!(described.len(), 1);
        assert_eq!(described[0].id, "i-standalone");
    }

    #[tokio::test]
    async fn stop_takes_snapshot_when_enabled() {
        let client = FakeDbInstanceClient::default();
        let adapter = DbInstanceAdapter::new(client, true, "my-stack");
        adapter
            .stop(&instance("i-standalone", false), StopOptions::default())
            .await
            .unwrap();
        assert_eq!(
            adapter.client.snapshots_taken.lock().unwrap().as_slice(),
            &["my-stack-stopped-i-standalone".to_string()]
        );
    }

    #[tokio::test]
    async fn stop_skips_snapshot_when_disabled() {
        let client = FakeDbInstanceClient::default();
        let adapter = DbInstanceAdapter::new(client, false, "my-stack");
        adapter
            .stop(&instance("i-standalone", false), StopOptions::default())
            .await
            .unwrap();
        assert!(adapter.client.snapshots_taken.lock().unwrap().is_empty());
    }
}
