//! State of one maintenance run.

use crate::inventory::ClusterSnapshot;
use crate::types::{CapacityBounds, InstanceRecord};

/// Lives for a whole run and is discarded with the process.
///
/// The original snapshot is captured once, after preconditions pass, and never
/// refreshed; instances discovered later are recorded alongside it.
#[derive(Debug, Clone)]
pub struct MaintenanceSession {
    cluster: String,
    group: String,
    original: ClusterSnapshot,
    original_bounds: CapacityBounds,
    replacements: Vec<InstanceRecord>,
    overflow: Option<InstanceRecord>,
}

impl MaintenanceSession {
    pub fn new(
        cluster: impl Into<String>,
        group: impl Into<String>,
        original: ClusterSnapshot,
        original_bounds: CapacityBounds,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            group: group.into(),
            original,
            original_bounds,
            replacements: Vec::new(),
            overflow: None,
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn original(&self) -> &ClusterSnapshot {
        &self.original
    }

    pub fn original_size(&self) -> usize {
        self.original.len()
    }

    pub fn original_bounds(&self) -> CapacityBounds {
        self.original_bounds
    }

    pub fn replacements(&self) -> &[InstanceRecord] {
        &self.replacements
    }

    pub fn record_replacement(&mut self, instance: InstanceRecord) {
        self.replacements.push(instance);
    }

    pub fn overflow(&self) -> Option<&InstanceRecord> {
        self.overflow.as_ref()
    }

    pub fn record_overflow(&mut self, instance: InstanceRecord) {
        self.overflow = Some(instance);
    }
}
