//! Point-in-time cluster membership snapshots.

use serde::Serialize;
use tracing::debug;

use crate::control_plane::ControlPlane;
use crate::error::{Result, RollError};
use crate::types::{ContainerInstance, InstanceKey, InstanceRecord};

/// Ordered sequence of instance records captured at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ClusterSnapshot {
    records: Vec<InstanceRecord>,
}

impl ClusterSnapshot {
    pub fn new(records: Vec<InstanceRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[InstanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstanceRecord> {
        self.records.iter()
    }

    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.records.iter().any(|r| r.matches(key))
    }

    pub fn find_by_compute_id(&self, compute_id: &str) -> Option<&InstanceRecord> {
        self.records.iter().find(|r| r.compute_id == compute_id)
    }

    pub fn compute_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.compute_id.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a ClusterSnapshot {
    type Item = &'a InstanceRecord;
    type IntoIter = std::slice::Iter<'a, InstanceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Live view of one cluster. Every call goes to the control plane; nothing is cached.
#[derive(Clone, Copy)]
pub struct Inventory<'a> {
    plane: &'a dyn ControlPlane,
    cluster: &'a str,
}

impl<'a> Inventory<'a> {
    pub fn new(plane: &'a dyn ControlPlane, cluster: &'a str) -> Self {
        Self { plane, cluster }
    }

    pub fn cluster(&self) -> &'a str {
        self.cluster
    }

    pub fn plane(&self) -> &'a dyn ControlPlane {
        self.plane
    }

    /// Fail with [`RollError::ClusterNotFound`] unless the cluster is listed.
    pub fn ensure_cluster_exists(&self) -> Result<()> {
        let arns = self.plane.list_clusters()?;
        if arns
            .iter()
            .any(|arn| cluster_name_from_arn(arn) == self.cluster)
        {
            Ok(())
        } else {
            Err(RollError::ClusterNotFound {
                cluster: self.cluster.to_string(),
            })
        }
    }

    /// Fetch full detail for every registered container instance.
    pub fn snapshot(&self) -> Result<ClusterSnapshot> {
        let mut scheduler_ids = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .plane
                .list_container_instances(self.cluster, next_token.as_deref())?;
            scheduler_ids.extend(page.items);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        let mut records = Vec::with_capacity(scheduler_ids.len());
        for scheduler_id in &scheduler_ids {
            // Instances can deregister between the listing and the describe call.
            if let Some(detail) = self.describe(scheduler_id)? {
                records.push(detail.record);
            }
        }
        debug!(cluster = self.cluster, members = records.len(), "captured snapshot");
        Ok(ClusterSnapshot::new(records))
    }

    pub fn describe(&self, scheduler_id: &str) -> Result<Option<ContainerInstance>> {
        Ok(self
            .plane
            .describe_container_instance(self.cluster, scheduler_id)?)
    }
}

/// `arn:aws:ecs:region:account:cluster/name` -> `name`.
pub fn cluster_name_from_arn(arn: &str) -> &str {
    arn.split_once('/').map_or(arn, |(_, name)| name)
}
