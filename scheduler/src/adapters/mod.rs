//! Service adapters (C6): one per resource family, each built against a
//! narrow `CloudClient`-style trait whose only production concern in this
//! repository is the documented failure taxonomy (§7) — implementing the
//! cloud provider APIs themselves is an explicit Non-goal. The
//! batching/retry/decision logic above that boundary is fully built and
//! tested against hand-rolled fakes.

pub mod asg;
pub mod batch;
pub mod db_cluster;
pub mod db_instance;
pub mod vm;

pub use batch::{bisect_retry, BisectRetryResponse};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::AdapterError;

/// A resource as the scheduler sees it, independent of resource family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbstractInstance {
    pub id: String,
    pub name: Option<String>,
    pub schedule_name: Option<String>,
    pub current_state: InstanceState,
    pub instance_type: Option<String>,
    pub tags: HashMap<String, String>,
    pub maintenance_windows: Vec<String>,
    pub is_resizable: bool,
}

impl AbstractInstance {
    pub fn is_running(&self) -> bool {
        self.current_state == InstanceState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.current_state == InstanceState::Stopped
    }

    pub fn preferred_instance_types(&self) -> Vec<String> {
        self.tags
            .get("PreferredInstanceTypes")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Running,
    Stopped,
    Stopping,
    Starting,
    Unknown,
}

/// Options accompanying a stop request.
#[derive(Debug, Clone, Default)]
pub struct StopOptions {
    pub hibernate: bool,
}

/// The shared contract every resource-family adapter implements, using
/// native `async fn` in a trait. This is not object-safe for `dyn`
/// dispatch, so the orchestrator dispatches by matching on `Service` and
/// calling each concrete adapter directly rather than holding trait
/// objects.
pub trait ServiceAdapter {
    async fn describe_managed_instances(
        &self,
        schedule_names: Option<&[String]>,
    ) -> Result<Vec<AbstractInstance>, AdapterError>;

    async fn start(&self, instance: &AbstractInstance, preferred_sizes: &[String]) -> Result<(), AdapterError>;

    async fn stop(&self, instance: &AbstractInstance, options: StopOptions) -> Result<(), AdapterError>;

    async fn resize(&self, instance: &AbstractInstance, target_size: &str) -> Result<(), AdapterError>;
}

/// The four resource families the orchestrator cross-products against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    Vm,
    DbInstance,
    DbCluster,
    Asg,
}

impl Service {
    pub fn tag_namespace(self) -> &'static str {
        match self {
            Service::Vm => "vm",
            Service::DbInstance => "db-instance",
            Service::DbCluster => "db-cluster",
            Service::Asg => "asg",
        }
    }
}
