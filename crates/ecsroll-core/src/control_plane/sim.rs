//! Deterministic in-memory control plane.
//!
//! Models one cluster backed by one capacity group. Nothing happens on its own:
//! time only moves when [`SimulatedCloud::tick`] is called. On each tick
//! - booting or rebooting instances that were already booting become healthy
//!   with their agent connected
//! - draining instances finish one running task
//! - the capacity group launches instances up to `desired`, or removes the
//!   earliest launched unprotected instances above it
//!
//! Two faults can be injected: a stray instance registered with the cluster
//! outside the capacity group, and a termination that is accepted but never
//! takes effect.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use super::ControlPlane;
use crate::types::{
    CapacityBounds, ContainerInstance, GroupMembership, HealthStatus, InstanceRecord,
    InstanceStatus, Page,
};

const ARN_PREFIX: &str = "arn:aws:ecs:sim-region:000000000000";

/// Mutating call observed by the simulation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    SetStatus {
        scheduler_id: String,
        status: InstanceStatus,
    },
    Terminate(String),
    Reboot(String),
    UpdateGroup(CapacityBounds),
    Protect {
        compute_ids: Vec<String>,
        protected: bool,
    },
}

#[derive(Debug, Clone)]
struct SimInstance {
    compute_id: String,
    scheduler_id: String,
    status: InstanceStatus,
    running_tasks: u32,
    pending_tasks: u32,
    health: HealthStatus,
    agent_connected: bool,
    booting: bool,
    /// Counted and removed by the capacity group. Strays are not.
    managed: bool,
}

impl SimInstance {
    fn record(&self) -> InstanceRecord {
        InstanceRecord {
            compute_id: self.compute_id.clone(),
            scheduler_id: self.scheduler_id.clone(),
            status: self.status.clone(),
            running_task_count: self.running_tasks,
            pending_task_count: self.pending_tasks,
        }
    }
}

#[derive(Debug)]
struct SimState {
    cluster: String,
    cluster_exists: bool,
    group: String,
    bounds: CapacityBounds,
    /// Launch order; removal on scale-in picks from the front.
    instances: Vec<SimInstance>,
    protected: BTreeSet<String>,
    foreign_memberships: BTreeMap<String, String>,
    tasks_per_instance: u32,
    page_size: usize,
    launched: usize,
    /// Terminations that are acknowledged but never carried out.
    stuck: BTreeSet<String>,
    calls: Vec<SimCall>,
}

impl SimState {
    fn find(&self, scheduler_id: &str) -> Option<&SimInstance> {
        self.instances
            .iter()
            .find(|i| i.scheduler_id == scheduler_id)
    }

    fn find_mut(&mut self, scheduler_id: &str) -> Option<&mut SimInstance> {
        self.instances
            .iter_mut()
            .find(|i| i.scheduler_id == scheduler_id)
    }

    fn launch(&mut self, compute_id: String, healthy: bool) {
        self.launched += 1;
        let scheduler_id = format!(
            "{}:container-instance/{}/{:04}",
            ARN_PREFIX, self.cluster, self.launched
        );
        self.instances.push(SimInstance {
            compute_id,
            scheduler_id,
            status: InstanceStatus::Active,
            running_tasks: if healthy { self.tasks_per_instance } else { 0 },
            pending_tasks: 0,
            health: if healthy {
                HealthStatus::Ok
            } else {
                HealthStatus::Initializing
            },
            agent_connected: healthy,
            booting: !healthy,
            managed: true,
        });
    }

    fn check_cluster(&self, cluster: &str) -> anyhow::Result<()> {
        if !self.cluster_exists || cluster != self.cluster {
            anyhow::bail!("ClusterNotFoundException: cluster '{}' not found", cluster);
        }
        Ok(())
    }
}

/// In-memory cluster, container scheduler and capacity group.
#[derive(Debug)]
pub struct SimulatedCloud {
    state: RefCell<SimState>,
}

impl SimulatedCloud {
    /// A healthy cluster whose members are exactly `compute_ids`, all managed
    /// by `group` with `desired == compute_ids.len()`.
    pub fn new(cluster: &str, group: &str, compute_ids: &[&str]) -> Self {
        let size = compute_ids.len() as i64;
        let mut state = SimState {
            cluster: cluster.to_string(),
            cluster_exists: true,
            group: group.to_string(),
            bounds: CapacityBounds::new(size.min(1), size + 2, size),
            instances: Vec::new(),
            protected: BTreeSet::new(),
            foreign_memberships: BTreeMap::new(),
            tasks_per_instance: 2,
            page_size: 2,
            launched: 0,
            stuck: BTreeSet::new(),
            calls: Vec::new(),
        };
        for id in compute_ids {
            state.launch((*id).to_string(), true);
        }
        Self {
            state: RefCell::new(state),
        }
    }

    pub fn with_bounds(self, bounds: CapacityBounds) -> Self {
        self.state.borrow_mut().bounds = bounds;
        self
    }

    pub fn with_tasks_per_instance(self, tasks: u32) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.tasks_per_instance = tasks;
            for instance in &mut state.instances {
                instance.running_tasks = tasks;
            }
        }
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.borrow_mut().page_size = page_size.max(1);
        self
    }

    /// Pretend the cluster does not exist.
    pub fn without_cluster(self) -> Self {
        self.state.borrow_mut().cluster_exists = false;
        self
    }

    /// Associate `compute_id` with another capacity group.
    pub fn with_foreign_membership(self, compute_id: &str, group: &str) -> Self {
        self.state
            .borrow_mut()
            .foreign_memberships
            .insert(compute_id.to_string(), group.to_string());
        self
    }

    /// Terminating `compute_id` is acknowledged but the instance stays registered.
    pub fn with_stuck_termination(self, compute_id: &str) -> Self {
        self.state.borrow_mut().stuck.insert(compute_id.to_string());
        self
    }

    /// Register a healthy instance with the cluster that no capacity group manages.
    pub fn register_stray(&self, compute_id: &str) {
        let mut state = self.state.borrow_mut();
        state.launch(compute_id.to_string(), true);
        if let Some(stray) = state.instances.last_mut() {
            stray.managed = false;
        }
    }

    /// Advance the simulation by one step.
    pub fn tick(&self) {
        let mut state = self.state.borrow_mut();

        for instance in &mut state.instances {
            if instance.booting {
                instance.booting = false;
                instance.health = HealthStatus::Ok;
                instance.agent_connected = true;
            }
            if instance.status == InstanceStatus::Draining {
                instance.running_tasks = instance.running_tasks.saturating_sub(1);
                instance.pending_tasks = 0;
            }
        }

        let live = state.instances.iter().filter(|i| i.managed).count() as i64;
        let desired = state.bounds.desired;
        if live < desired {
            for _ in live..desired {
                let compute_id = format!("i-sim{:04}", state.launched + 1);
                state.launch(compute_id, false);
            }
        } else if live > desired {
            let mut excess = (live - desired) as usize;
            let protected = state.protected.clone();
            state.instances.retain(|i| {
                if excess > 0 && i.managed && !protected.contains(&i.compute_id) {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.state.borrow().calls.clone()
    }

    pub fn bounds(&self) -> CapacityBounds {
        self.state.borrow().bounds
    }

    pub fn protected(&self) -> BTreeSet<String> {
        self.state.borrow().protected.clone()
    }

    /// Current members in launch order.
    pub fn members(&self) -> Vec<InstanceRecord> {
        self.state
            .borrow()
            .instances
            .iter()
            .map(SimInstance::record)
            .collect()
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.state
            .borrow()
            .instances
            .iter()
            .map(|i| i.compute_id.clone())
            .collect()
    }
}

impl ControlPlane for SimulatedCloud {
    fn list_clusters(&self) -> anyhow::Result<Vec<String>> {
        let state = self.state.borrow();
        let mut arns = vec![format!("{}:cluster/unrelated", ARN_PREFIX)];
        if state.cluster_exists {
            arns.push(format!("{}:cluster/{}", ARN_PREFIX, state.cluster));
        }
        Ok(arns)
    }

    fn list_container_instances(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> anyhow::Result<Page<String>> {
        let state = self.state.borrow();
        state.check_cluster(cluster)?;
        let start: usize = match next_token {
            Some(token) => token.parse()?,
            None => 0,
        };
        let end = (start + state.page_size).min(state.instances.len());
        let items = state.instances[start.min(end)..end]
            .iter()
            .map(|i| i.scheduler_id.clone())
            .collect();
        let next_token = (end < state.instances.len()).then(|| end.to_string());
        Ok(Page { items, next_token })
    }

    fn describe_container_instance(
        &self,
        cluster: &str,
        scheduler_id: &str,
    ) -> anyhow::Result<Option<ContainerInstance>> {
        let state = self.state.borrow();
        state.check_cluster(cluster)?;
        Ok(state.find(scheduler_id).map(|i| ContainerInstance {
            record: i.record(),
            agent_connected: i.agent_connected,
        }))
    }

    fn set_container_instance_status(
        &self,
        cluster: &str,
        scheduler_id: &str,
        status: &InstanceStatus,
    ) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        state.check_cluster(cluster)?;
        let instance = state
            .find_mut(scheduler_id)
            .ok_or_else(|| anyhow::anyhow!("unknown container instance {}", scheduler_id))?;
        instance.status = status.clone();
        state.calls.push(SimCall::SetStatus {
            scheduler_id: scheduler_id.to_string(),
            status: status.clone(),
        });
        Ok(())
    }

    fn list_running_tasks(
        &self,
        cluster: &str,
        scheduler_id: &str,
    ) -> anyhow::Result<Vec<String>> {
        let state = self.state.borrow();
        state.check_cluster(cluster)?;
        let running = state.find(scheduler_id).map_or(0, |i| i.running_tasks);
        Ok((0..running)
            .map(|n| format!("{}:task/{}/{}", ARN_PREFIX, state.cluster, n))
            .collect())
    }

    fn terminate_instance(&self, compute_id: &str) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.stuck.contains(compute_id) {
            state.calls.push(SimCall::Terminate(compute_id.to_string()));
            return Ok(());
        }
        let before = state.instances.len();
        state.instances.retain(|i| i.compute_id != compute_id);
        if state.instances.len() == before {
            anyhow::bail!("InvalidInstanceID.NotFound: {}", compute_id);
        }
        state.protected.remove(compute_id);
        state.calls.push(SimCall::Terminate(compute_id.to_string()));
        Ok(())
    }

    fn reboot_instance(&self, compute_id: &str) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.compute_id == compute_id)
            .ok_or_else(|| anyhow::anyhow!("InvalidInstanceID.NotFound: {}", compute_id))?;
        instance.booting = true;
        instance.health = HealthStatus::Unavailable;
        instance.agent_connected = false;
        state.calls.push(SimCall::Reboot(compute_id.to_string()));
        Ok(())
    }

    fn instance_health(&self, compute_id: &str) -> anyhow::Result<HealthStatus> {
        let state = self.state.borrow();
        Ok(state
            .instances
            .iter()
            .find(|i| i.compute_id == compute_id)
            .map_or(HealthStatus::Unavailable, |i| i.health.clone()))
    }

    fn describe_capacity_group(&self, group: &str) -> anyhow::Result<CapacityBounds> {
        let state = self.state.borrow();
        if group != state.group {
            anyhow::bail!("auto scaling group '{}' not found", group);
        }
        Ok(state.bounds)
    }

    fn update_capacity_group(&self, group: &str, bounds: CapacityBounds) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        if group != state.group {
            anyhow::bail!("auto scaling group '{}' not found", group);
        }
        if !bounds.is_valid() {
            anyhow::bail!("ValidationError: invalid bounds {}", bounds);
        }
        state.bounds = bounds;
        state.calls.push(SimCall::UpdateGroup(bounds));
        Ok(())
    }

    fn set_scale_in_protection(
        &self,
        group: &str,
        compute_ids: &[String],
        protected: bool,
    ) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        if group != state.group {
            anyhow::bail!("auto scaling group '{}' not found", group);
        }
        for id in compute_ids {
            if protected {
                state.protected.insert(id.clone());
            } else {
                state.protected.remove(id);
            }
        }
        state.calls.push(SimCall::Protect {
            compute_ids: compute_ids.to_vec(),
            protected,
        });
        Ok(())
    }

    fn list_group_memberships(
        &self,
        next_token: Option<&str>,
    ) -> anyhow::Result<Page<GroupMembership>> {
        let state = self.state.borrow();
        let all: Vec<GroupMembership> = state
            .instances
            .iter()
            .filter(|i| i.managed)
            .map(|i| GroupMembership {
                group: state
                    .foreign_memberships
                    .get(&i.compute_id)
                    .cloned()
                    .unwrap_or_else(|| state.group.clone()),
                compute_id: i.compute_id.clone(),
            })
            .chain(std::iter::once(GroupMembership {
                compute_id: "i-outside".to_string(),
                group: "unrelated-asg".to_string(),
            }))
            .collect();
        let start: usize = match next_token {
            Some(token) => token.parse()?,
            None => 0,
        };
        let end = (start + state.page_size).min(all.len());
        let next_token = (end < all.len()).then(|| end.to_string());
        Ok(Page {
            items: all[start.min(end)..end].to_vec(),
            next_token,
        })
    }
}
