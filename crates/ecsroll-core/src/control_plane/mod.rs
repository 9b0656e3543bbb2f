//! Control-plane client abstraction.
//!
//! Everything the orchestrator knows about the outside world goes through
//! [`ControlPlane`]: the container scheduler, the compute lifecycle service and
//! the elastic capacity group. Calls are synchronous and never retried here.
//!
//! Two backends are provided:
//! - [`AwsCli`] drives the provider's own command-line client as a subprocess
//! - [`SimulatedCloud`] is a deterministic in-memory cluster for tests

pub mod aws_cli;
pub mod sim;

pub use aws_cli::AwsCli;
pub use sim::{SimCall, SimulatedCloud};

use crate::types::{
    CapacityBounds, ContainerInstance, GroupMembership, HealthStatus, InstanceStatus, Page,
};

pub trait ControlPlane {
    /// ARNs of every cluster visible to the caller.
    fn list_clusters(&self) -> anyhow::Result<Vec<String>>;

    /// One page of container-instance identifiers registered in `cluster`.
    fn list_container_instances(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> anyhow::Result<Page<String>>;

    /// Full detail of one container instance, or `None` if it is not registered.
    fn describe_container_instance(
        &self,
        cluster: &str,
        scheduler_id: &str,
    ) -> anyhow::Result<Option<ContainerInstance>>;

    fn set_container_instance_status(
        &self,
        cluster: &str,
        scheduler_id: &str,
        status: &InstanceStatus,
    ) -> anyhow::Result<()>;

    /// Identifiers of tasks currently running on a container instance.
    fn list_running_tasks(&self, cluster: &str, scheduler_id: &str)
    -> anyhow::Result<Vec<String>>;

    fn terminate_instance(&self, compute_id: &str) -> anyhow::Result<()>;

    fn reboot_instance(&self, compute_id: &str) -> anyhow::Result<()>;

    fn instance_health(&self, compute_id: &str) -> anyhow::Result<HealthStatus>;

    fn describe_capacity_group(&self, group: &str) -> anyhow::Result<CapacityBounds>;

    fn update_capacity_group(&self, group: &str, bounds: CapacityBounds) -> anyhow::Result<()>;

    fn set_scale_in_protection(
        &self,
        group: &str,
        compute_ids: &[String],
        protected: bool,
    ) -> anyhow::Result<()>;

    /// One page of compute instance to capacity group associations.
    fn list_group_memberships(
        &self,
        next_token: Option<&str>,
    ) -> anyhow::Result<Page<GroupMembership>>;
}
