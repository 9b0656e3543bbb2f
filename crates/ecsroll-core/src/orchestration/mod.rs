//! Rolling maintenance of every instance in a cluster, one at a time.
//!
//! Both actions share the same skeleton:
//! 1. Validate preconditions and capture the original snapshot
//! 2. Provision one buffer instance so capacity never drops below the original size
//! 3. Confirm and process each original instance in order
//! 4. Shrink back to the original size, letting scale-in protection pick the
//!    instance the capacity group removes
//!
//! What differs per action lives behind [`Workflow`].

mod reboot;
mod replace;
pub mod session;

pub use session::MaintenanceSession;

use serde::Serialize;
use tracing::info;

use crate::capacity::CapacityCoordinator;
use crate::config::RollConfig;
use crate::control_plane::ControlPlane;
use crate::converge::{Cadence, ConvergenceWaiter, Pacer};
use crate::error::Result;
use crate::gate::{HumanGate, Prompter};
use crate::inventory::{ClusterSnapshot, Inventory};
use crate::types::{Action, CapacityBounds, InstanceRecord, InstanceStatus};

use reboot::RebootWorkflow;
use replace::ReplaceWorkflow;

/// Renders snapshots for the operator.
pub trait Reporter {
    fn snapshot(&mut self, heading: &str, snapshot: &ClusterSnapshot);
}

/// Operator-facing collaborators of a run.
pub struct OperatorIo<'a> {
    pub prompter: &'a mut dyn Prompter,
    pub pacer: &'a mut dyn Pacer,
    pub reporter: &'a mut dyn Reporter,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RollReport {
    pub action: Action,
    pub cluster: String,
    pub group: String,
    pub original: ClusterSnapshot,
    /// Instances that joined in place of the originals (REPLACE).
    pub replacements: Vec<InstanceRecord>,
    /// Buffer instance drained and removed at the end (REBOOT).
    pub overflow: Option<InstanceRecord>,
    pub final_snapshot: ClusterSnapshot,
    pub original_bounds: CapacityBounds,
    pub final_bounds: CapacityBounds,
}

/// 1-based position of the instance being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    index: usize,
    total: usize,
}

impl Position {
    fn is_last(&self) -> bool {
        self.index == self.total
    }
}

/// Per-action part of a run.
trait Workflow {
    fn provision(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        session: &mut MaintenanceSession,
    ) -> Result<()>;

    fn process(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        session: &mut MaintenanceSession,
        position: Position,
        target: &InstanceRecord,
    ) -> Result<()>;

    fn finish(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        session: &mut MaintenanceSession,
    ) -> Result<()>;
}

pub struct RollingOrchestrator<'a> {
    config: &'a RollConfig,
    inventory: Inventory<'a>,
    capacity: CapacityCoordinator<'a>,
    gate: HumanGate<'a>,
    waiter: ConvergenceWaiter<'a>,
    reporter: &'a mut dyn Reporter,
}

impl<'a> RollingOrchestrator<'a> {
    pub fn new(plane: &'a dyn ControlPlane, config: &'a RollConfig, io: OperatorIo<'a>) -> Self {
        let inventory = Inventory::new(plane, &config.cluster);
        Self {
            config,
            inventory,
            capacity: CapacityCoordinator::new(plane),
            gate: HumanGate::new(io.prompter, config.assume_yes),
            waiter: ConvergenceWaiter::new(inventory, config.wait, io.pacer),
            reporter: io.reporter,
        }
    }

    /// Run the configured action to completion.
    pub fn run(&mut self) -> Result<RollReport> {
        let action = self.config.action;
        let mut session = self.prepare()?;
        let total = session.original_size();

        self.gate.confirm(&format!(
            "Initiate {} cycle for {} ECS instances ({})?",
            action,
            total,
            session.original().compute_ids().join(", ")
        ))?;

        let mut workflow: Box<dyn Workflow> = match action {
            Action::Replace => Box::new(ReplaceWorkflow),
            Action::Reboot => Box::new(RebootWorkflow),
        };

        workflow.provision(self, &mut session)?;

        let originals = session.original().records().to_vec();
        for (i, target) in originals.iter().enumerate() {
            let position = Position {
                index: i + 1,
                total,
            };
            self.gate.confirm(&format!(
                "Perform {} {} of {}, targeting instance {} [{}]?",
                action.as_str(),
                position.index,
                position.total,
                target.compute_id,
                target.scheduler_id
            ))?;
            info!(
                action = action.as_str(),
                index = position.index,
                total,
                instance = %target.compute_id,
                "processing original instance"
            );
            workflow.process(self, &mut session, position, target)?;
        }

        workflow.finish(self, &mut session)?;

        let final_snapshot = self.inventory.snapshot()?;
        self.reporter.snapshot(
            "ECS cluster has been returned to original size. Current cluster members:",
            &final_snapshot,
        );
        let final_bounds = self.capacity.describe(session.group())?.bounds;
        info!(
            cluster = session.cluster(),
            members = final_snapshot.len(),
            bounds = %final_bounds,
            "maintenance complete"
        );

        Ok(RollReport {
            action,
            cluster: session.cluster().to_string(),
            group: session.group().to_string(),
            original: session.original().clone(),
            replacements: session.replacements().to_vec(),
            overflow: session.overflow().cloned(),
            final_snapshot,
            original_bounds: session.original_bounds(),
            final_bounds,
        })
    }

    /// Preconditions, group resolution and the operator's go-ahead on both.
    fn prepare(&mut self) -> Result<MaintenanceSession> {
        let cluster = self.inventory.cluster();
        self.inventory.ensure_cluster_exists()?;
        let original = self.inventory.snapshot()?;
        let group = self.capacity.resolve_single_group(cluster, &original)?;

        self.gate
            .confirm(&format!("Continue, working with ECS cluster '{}'?", cluster))?;
        self.gate
            .confirm(&format!("Continue, working with ASG '{}'?", group))?;
        self.reporter
            .snapshot(&format!("ECS cluster '{}' members:", cluster), &original);

        let bounds = self.capacity.describe(&group)?.bounds;
        info!(cluster, group = %group, members = original.len(), bounds = %bounds, "session started");
        Ok(MaintenanceSession::new(cluster, group, original, bounds))
    }

    fn confirm(&mut self, message: &str) -> Result<()> {
        self.gate.confirm(message)
    }

    fn snapshot(&self) -> Result<ClusterSnapshot> {
        self.inventory.snapshot()
    }

    fn report(&mut self, heading: &str) -> Result<()> {
        let snapshot = self.inventory.snapshot()?;
        self.reporter.snapshot(heading, &snapshot);
        Ok(())
    }

    fn settle(&mut self, message: &str, cadence: Cadence) {
        self.waiter.pause(message, cadence);
    }

    fn grow(&mut self, session: &MaintenanceSession, reason: &str) -> Result<()> {
        info!(group = session.group(), "{}", reason);
        self.capacity.bump(session.group(), 1)?;
        Ok(())
    }

    fn expect_size(&mut self, count: usize) -> Result<()> {
        self.waiter.until_instance_count(&mut self.gate, count)
    }

    fn expect_status(&mut self, instance: &InstanceRecord, status: &InstanceStatus) -> Result<()> {
        self.waiter
            .until_instance_status(&mut self.gate, &instance.compute_id, status)
    }

    fn set_status(&mut self, instance: &InstanceRecord, status: &InstanceStatus) -> Result<()> {
        info!(instance = %instance.scheduler_id, %status, "updating container instance status");
        self.inventory.plane().set_container_instance_status(
            self.inventory.cluster(),
            &instance.scheduler_id,
            status,
        )?;
        Ok(())
    }

    /// Mark DRAINING and wait for the running task count to reach zero.
    fn drain(&mut self, instance: &InstanceRecord) -> Result<()> {
        self.set_status(instance, &InstanceStatus::Draining)?;
        self.waiter.until_drained(instance)
    }

    /// Wait for compute health `ok`, then for the scheduler agent to connect.
    fn await_ready(&mut self, instance: &InstanceRecord) -> Result<()> {
        self.waiter.until_compute_ok(&instance.compute_id)?;
        self.waiter.until_agent_connected(instance)
    }

    fn terminate(&mut self, instance: &InstanceRecord) -> Result<()> {
        info!(instance = %instance.compute_id, "terminating instance");
        self.inventory.plane().terminate_instance(&instance.compute_id)?;
        self.settle(
            &format!(
                "Terminating original instance {} [{}]",
                instance.compute_id, instance.scheduler_id
            ),
            Cadence::SETTLE,
        );
        Ok(())
    }

    fn reboot(&mut self, instance: &InstanceRecord, pass: usize) -> Result<()> {
        info!(instance = %instance.compute_id, pass, "rebooting instance");
        self.inventory.plane().reboot_instance(&instance.compute_id)?;
        self.settle(
            &format!(
                "Reboot ({}/2) for instance {} [{}]",
                pass, instance.compute_id, instance.scheduler_id
            ),
            Cadence::SETTLE,
        );
        Ok(())
    }

    /// Return to the original size, protecting `survivors` so the group removes the rest.
    ///
    /// Protection is cleared again once the cluster is back to its original size.
    fn shrink(
        &mut self,
        session: &MaintenanceSession,
        survivors: &[InstanceRecord],
        settle: Cadence,
    ) -> Result<()> {
        self.capacity.set_protection(session.group(), survivors, true)?;
        self.capacity.bump(session.group(), -1)?;
        self.settle(
            "Returned to original ASG size, waiting for ASG to downsize ECS cluster",
            settle,
        );
        self.expect_size(session.original_size())?;
        self.capacity.set_protection(session.group(), survivors, false)
    }
}
