//! Auto-scaling group adapter (C6): "stop" remembers the group's current
//! min/desired/max in a tag and scales to zero; "start" restores the
//! remembered values. Tolerates and migrates a legacy colon-separated tag
//! format to the canonical JSON form, idempotently.

use serde::{Deserialize, Serialize};

use crate::adapters::{AbstractInstance, Service, ServiceAdapter, StopOptions};
use crate::errors::AdapterError;

pub const REMEMBERED_CAPACITY_TAG: &str = "scheduler:remembered-capacity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedCapacity {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

/// Parse either the canonical JSON form or the legacy `min:desired:max`
/// form this was distilled from.
pub fn parse_remembered_capacity(raw: &str) -> Option<RememberedCapacity> {
    if let Ok(parsed) = serde_json::from_str::<RememberedCapacity>(raw) {
        return Some(parsed);
    }
    let parts: Vec<_> = raw.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let min = parts[0].parse().ok()?;
    let desired = parts[1].parse().ok()?;
    let max = parts[2].parse().ok()?;
    Some(RememberedCapacity { min, desired, max })
}

pub trait AsgCloudClient: Send + Sync {
    async fn describe_tagged_groups(
        &self,
        schedule_names: Option<&[String]>,
    ) -> Result<Vec<AbstractInstance>, AdapterError>;
    async fn set_capacity(&self, asg_name: &str, capacity: RememberedCapacity) -> Result<(), AdapterError>;
    async fn get_capacity(&self, asg_name: &str) -> Result<RememberedCapacity, AdapterError>;
    async fn read_remembered_capacity_tag(&self, asg_name: &str) -> Result<Option<String>, AdapterError>;
    async fn write_remembered_capacity_tag(&self, asg_name: &str, raw: &str) -> Result<(), AdapterError>;
}

pub struct AsgAdapter<C: AsgCloudClient> {
    client: C,
}

impl<C: AsgCloudClient> AsgAdapter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub const SERVICE: Service = Service::Asg;

    fn canonical_tag(capacity: RememberedCapacity) -> String {
        serde_json::to_string(&capacity).expect("RememberedCapacity always serializes")
    }

    /// Read the remembered-capacity tag, migrating a legacy format in
    /// place (idempotent: a group already in canonical form is untouched).
    async fn remembered_capacity(&self, asg_name: &str) -> Result<Option<RememberedCapacity>, AdapterError> {
        let raw = match self.client.read_remembered_capacity_tag(asg_name).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let parsed = parse_remembered_capacity(&raw);
        if let Some(capacity) = parsed {
            let canonical = Self::canonical_tag(capacity);
            if canonical != raw {
                self.client
                    .write_remembered_capacity_tag(asg_name, &canonical)
                    .await?;
            }
        }
        Ok(parsed)
    }
}

impl<C: AsgCloudClient> ServiceAdapter for AsgAdapter<C> {
    async fn describe_managed_instances(
        &self,
        schedule_names: Option<&[String]>,
    ) -> Result<Vec<AbstractInstance>, AdapterError> {
        self.client.describe_tagged_groups(schedule_names).await
    }

    async fn start(&self, instance: &AbstractInstance, _preferred_sizes: &[String]) -> Result<(), AdapterError> {
        let remembered = self.remembered_capacity(&instance.id).await?;
        let capacity = remembered.unwrap_or(RememberedCapacity {
            min: 1,
            desired: 1,
            max: 1,
        });
        self.client.set_capacity(&instance.id, capacity).await
    }

    async fn stop(&self, instance: &AbstractInstance, _options: StopOptions) -> Result<(), AdapterError> {
        // Only remember capacity the first time: if already remembered
        // (e.g. a previous stop that didn't clear it), this is a no-op
        // repeat stop and must not remember the already-zeroed values.
        if self.client.read_remembered_capacity_tag(&instance.id).await?.is_none() {
            let current = self.client.get_capacity(&instance.id).await?;
            self.client
                .write_remembered_capacity_tag(&instance.id, &Self::canonical_tag(current))
                .await?;
        }
        self.client
            .set_capacity(
                &instance.id,
                RememberedCapacity {
                    min: 0,
                    desired: 0,
                    max: 0,
                },
            )
            .await
    }

    async fn resize(&self, _instance: &AbstractInstance, _target_size: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Terminal {
            reason: "auto-scaling groups are not resizable through this adapter".to_string(),
        })
    }
}
