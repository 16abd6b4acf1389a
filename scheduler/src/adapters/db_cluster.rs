//! Managed DB cluster adapter (C6): a cluster is only scheduled when it
//! carries the schedule tag itself *and* cluster scheduling is enabled in
//! `GlobalConfig`; individual cluster members are never scheduled (see
//! `db_instance`'s exclusion filter).

use crate::adapters::{AbstractInstance, Service, ServiceAdapter, StopOptions};
use crate::errors::AdapterError;

pub trait DbClusterCloudClient: Send + Sync {
    async fn describe_tagged_clusters(
        &self,
        schedule_names: Option<&[String]>,
    ) -> Result<Vec<AbstractInstance>, AdapterError>;
    async fn start_cluster(&self, id: &str) -> Result<(), AdapterError>;
    async fn stop_cluster(&self, id: &str) -> Result<(), AdapterError>;
}

pub struct DbClusterAdapter<C: DbClusterCloudClient> {
    client: C,
    cluster_scheduling_enabled: bool,
}

impl<C: DbClusterCloudClient> DbClusterAdapter<C> {
    pub fn new(client: C, cluster_scheduling_enabled: bool) -> Self {
        Self {
            client,
            cluster_scheduling_enabled,
        }
    }

    pub const SERVICE: Service = Service::DbCluster;
}

impl<C: DbClusterCloudClient> ServiceAdapter for DbClusterAdapter<C> {
    async fn describe_managed_instances(
        &self,
        schedule_names: Option<&[String]>,
    ) -> Result<Vec<AbstractInstance>, AdapterError> {
        if !self.cluster_scheduling_enabled {
            return Ok(Vec::new());
        }
        self.client.describe_tagged_clusters(schedule_names).await
    }

    async fn start(&self, instance: &AbstractInstance, _preferred_sizes: &[String]) -> Result<(), AdapterError> {
        self.client.start_cluster(&instance.id).await
    }

    async fn stop(&self, instance: &AbstractInstance, _options: StopOptions) -> Result<(), AdapterError> {
        self.client.stop_cluster(&instance.id).await
    }

    async fn resize(&self, _instance: &AbstractInstance, _target_size: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Terminal {
            reason: "database clusters are not resizable through this adapter".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InstanceState;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeDbClusterClient {
        clusters: Vec<AbstractInstance>,
    }

    impl DbClusterCloudClient for FakeDbClusterClient {
        async fn describe_tagged_clusters(
            &self,
            _schedule_names: Option<&[String]>,
        ) -> Result<Vec<AbstractInstance>, AdapterError> {
            Ok(self.clusters.clone())
        }
        async fn start_cluster(&self, _id: &str) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn stop_cluster(&self, _id: &str) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn cluster(id: &str) -> AbstractInstance {
        AbstractInstance {
            id: id.to_string(),
            name: None,
            schedule_name: Some("business-hours".into()),
            current_state: InstanceState::Running,
            instance_type: None,
            tags: HashMap::new(),
            maintenance_windows: vec![],
            is_resizable: false,
        }
    }

    #[tokio::test]
    async fn describe_returns_nothing_when_cluster_scheduling_disabled() {
        let client = FakeDbClusterClient {
            clusters: vec![cluster("prod-cluster")],
        };
        let adapter = DbClusterAdapter::new(client, false);
        assert!(adapter.describe_managed_instances(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn describe_returns_tagged_clusters_when_enabled() {
        let client = FakeDbClusterClient {
            clusters: vec![cluster("prod-cluster")],
        };
        let adapter = DbClusterAdapter::new(client, true);
        assert_eq!(adapter.describe_managed_instances(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resize_is_unsupported() {
        let client = FakeDbClusterClient::default();
        let adapter = DbClusterAdapter::new(client, true);
        assert!(adapter.resize(&cluster("prod-cluster"), "db.r5.large").await.is_err());
    }
}
