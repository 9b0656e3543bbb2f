//! Shared core types used across the inventory, capacity and orchestration layers.

use std::fmt;

use serde::Serialize;

/// Maintenance action selecting the per-instance workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Retire every original instance in favour of a freshly launched one.
    #[default]
    Replace,
    /// Drain and reboot every original instance in place, twice.
    Reboot,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Replace => "replace",
            Action::Reboot => "reboot",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Container instance state as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum InstanceStatus {
    Active,
    Draining,
    /// Any other scheduler state (REGISTERING, INACTIVE, ...). Never written.
    Other(String),
}

impl InstanceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Active => "ACTIVE",
            InstanceStatus::Draining => "DRAINING",
            InstanceStatus::Other(s) => s,
        }
    }
}

impl From<String> for InstanceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ACTIVE" => InstanceStatus::Active,
            "DRAINING" => InstanceStatus::Draining,
            _ => InstanceStatus::Other(value),
        }
    }
}

impl From<InstanceStatus> for String {
    fn from(value: InstanceStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying compute instance health as reported by the lifecycle service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Impaired,
    Initializing,
    InsufficientData,
    NotApplicable,
    /// No status reported at all (stopped or mid-reboot).
    Unavailable,
}

impl HealthStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "ok" => HealthStatus::Ok,
            "impaired" => HealthStatus::Impaired,
            "initializing" => HealthStatus::Initializing,
            "insufficient-data" => HealthStatus::InsufficientData,
            "not-applicable" => HealthStatus::NotApplicable,
            _ => HealthStatus::Unavailable,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Impaired => "impaired",
            HealthStatus::Initializing => "initializing",
            HealthStatus::InsufficientData => "insufficient-data",
            HealthStatus::NotApplicable => "not-applicable",
            HealthStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier pair of a cluster member. Snapshots are compared by this key only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub compute_id: String,
    pub scheduler_id: String,
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.compute_id, self.scheduler_id)
    }
}

/// Point-in-time view of one container instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceRecord {
    pub compute_id: String,
    pub scheduler_id: String,
    pub status: InstanceStatus,
    pub running_task_count: u32,
    pub pending_task_count: u32,
}

impl InstanceRecord {
    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            compute_id: self.compute_id.clone(),
            scheduler_id: self.scheduler_id.clone(),
        }
    }

    /// Whether both identifiers match `key`.
    pub fn matches(&self, key: &InstanceKey) -> bool {
        self.compute_id == key.compute_id && self.scheduler_id == key.scheduler_id
    }
}

/// Describe result for a container instance: the record plus agent connectivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInstance {
    pub record: InstanceRecord,
    pub agent_connected: bool,
}

/// Size bounds of a capacity group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityBounds {
    pub min: i64,
    pub max: i64,
    pub desired: i64,
}

impl CapacityBounds {
    pub fn new(min: i64, max: i64, desired: i64) -> Self {
        Self { min, max, desired }
    }

    /// `0 <= min <= desired <= max`.
    pub fn is_valid(&self) -> bool {
        self.min >= 0 && self.min <= self.desired && self.desired <= self.max
    }

    /// Apply the same signed delta to all three bounds.
    pub fn shifted(&self, delta: i64) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
            desired: self.desired + delta,
        }
    }
}

impl fmt::Display for CapacityBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={} desired={} max={}",
            self.min, self.desired, self.max
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityGroup {
    pub name: String,
    pub bounds: CapacityBounds,
}

/// Association of a compute instance with the capacity group that manages it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    pub compute_id: String,
    pub group: String,
}

/// One page of a paginated control-plane listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}
