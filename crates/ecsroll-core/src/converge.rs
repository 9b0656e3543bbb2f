//! Observe-until-converged waits.
//!
//! Two escalation policies:
//! - health: poll until the condition holds, never involving the operator
//! - expectation: after every failed check ask the operator whether to keep
//!   waiting; "no" aborts the run
//!
//! Both are plain loops, so arbitrarily long waits use constant stack.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, RollError};
use crate::gate::HumanGate;
use crate::inventory::Inventory;
use crate::types::{HealthStatus, InstanceRecord, InstanceStatus};

/// Sleeps between observations. Implementations may render a countdown.
pub trait Pacer {
    fn pause(&mut self, message: &str, duration: Duration);
}

/// Multiple of the base wait used for one kind of pause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence(f64);

impl Cadence {
    /// Cluster size checks.
    pub const RESIZE: Cadence = Cadence(3.0);
    /// Container instance status checks.
    pub const STATUS: Cadence = Cadence(0.5);
    /// Compute health and drain polls.
    pub const POLL: Cadence = Cadence(1.0);
    /// Scheduler agent connection polls.
    pub const AGENT: Cadence = Cadence(2.0);
    /// Settling after a scale-up, reboot or termination.
    pub const SETTLE: Cadence = Cadence(1.0);
    /// Settling after the final REPLACE downsize.
    pub const DOWNSIZE: Cadence = Cadence(2.0);

    /// Scaled wait, saturating at [`Duration::MAX`].
    pub fn of(self, base: Duration) -> Duration {
        Duration::try_from_secs_f64(base.as_secs_f64() * self.0).unwrap_or(Duration::MAX)
    }
}

/// Outcome of one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Met,
    /// Not yet; carries a description of what was observed instead.
    Pending(String),
}

pub struct ConvergenceWaiter<'a> {
    inventory: Inventory<'a>,
    base: Duration,
    pacer: &'a mut dyn Pacer,
}

impl<'a> ConvergenceWaiter<'a> {
    pub fn new(inventory: Inventory<'a>, base: Duration, pacer: &'a mut dyn Pacer) -> Self {
        Self {
            inventory,
            base,
            pacer,
        }
    }

    pub fn pause(&mut self, message: &str, cadence: Cadence) {
        self.pacer.pause(message, cadence.of(self.base));
    }

    /// Health policy: observe first, pause between failed observations, never escalate.
    pub fn until_healthy<F>(&mut self, description: &str, cadence: Cadence, mut observe: F) -> Result<()>
    where
        F: FnMut(&Inventory<'a>) -> Result<Check>,
    {
        let mut polls = 0usize;
        loop {
            match observe(&self.inventory)? {
                Check::Met => {
                    debug!(condition = description, polls, "condition met");
                    return Ok(());
                }
                Check::Pending(observed) => {
                    polls += 1;
                    let message = format!("{}; {}", description, observed);
                    self.pause(&message, cadence);
                }
            }
        }
    }

    /// Expectation policy: pause, observe, and on mismatch ask whether to keep waiting.
    pub fn until_expected<F>(
        &mut self,
        gate: &mut HumanGate<'_>,
        description: &str,
        cadence: Cadence,
        mut observe: F,
    ) -> Result<()>
    where
        F: FnMut(&Inventory<'a>) -> Result<Check>,
    {
        let mut escalations = 0usize;
        loop {
            self.pause(description, cadence);
            match observe(&self.inventory)? {
                Check::Met => {
                    debug!(condition = description, escalations, "expectation met");
                    return Ok(());
                }
                Check::Pending(observed) => {
                    escalations += 1;
                    warn!(condition = description, escalations, %observed, "expectation not met");
                    gate.confirm(&format!("{} - keep waiting?", observed))?;
                }
            }
        }
    }

    /// Wait until the cluster has exactly `count` members.
    pub fn until_instance_count(&mut self, gate: &mut HumanGate<'_>, count: usize) -> Result<()> {
        let description = format!(
            "Waiting for cluster size change (expected instance count: {})",
            count
        );
        self.until_expected(gate, &description, Cadence::RESIZE, |inventory| {
            let current = inventory.snapshot()?.len();
            Ok(if current == count {
                Check::Met
            } else {
                Check::Pending(format!(
                    "There are currently {} instances, but expecting {}",
                    current, count
                ))
            })
        })
    }

    /// Wait until `compute_id` reports `status`. The instance vanishing is fatal.
    pub fn until_instance_status(
        &mut self,
        gate: &mut HumanGate<'_>,
        compute_id: &str,
        status: &InstanceStatus,
    ) -> Result<()> {
        let description = format!("Waiting for instance {} to have {} status", compute_id, status);
        self.until_expected(gate, &description, Cadence::STATUS, |inventory| {
            let snapshot = inventory.snapshot()?;
            let record = snapshot.find_by_compute_id(compute_id).ok_or_else(|| {
                RollError::InstanceVanished {
                    compute_id: compute_id.to_string(),
                }
            })?;
            Ok(if &record.status == status {
                Check::Met
            } else {
                Check::Pending(format!(
                    "Instance {} has status {} but expecting {}",
                    compute_id, record.status, status
                ))
            })
        })
    }

    /// Wait until the compute lifecycle service reports the instance as `ok`.
    pub fn until_compute_ok(&mut self, compute_id: &str) -> Result<()> {
        let description = format!("Waiting for instance {} to be 'ok'", compute_id);
        self.until_healthy(&description, Cadence::POLL, |inventory| {
            let health = inventory.plane().instance_health(compute_id)?;
            Ok(match health {
                HealthStatus::Ok => Check::Met,
                other => Check::Pending(format!("currently '{}'", other)),
            })
        })
    }

    /// Wait until the scheduler agent on the instance reports connected.
    pub fn until_agent_connected(&mut self, instance: &InstanceRecord) -> Result<()> {
        let description = format!(
            "Waiting for instance {} to have its ECS agent connected",
            instance.compute_id
        );
        self.until_healthy(&description, Cadence::AGENT, |inventory| {
            let detail = inventory.describe(&instance.scheduler_id)?;
            Ok(match detail {
                Some(detail) if detail.agent_connected => Check::Met,
                Some(_) => Check::Pending("agent disconnected".to_string()),
                None => Check::Pending("not registered".to_string()),
            })
        })
    }

    /// Wait until no task is running on the instance.
    pub fn until_drained(&mut self, instance: &InstanceRecord) -> Result<()> {
        let description = format!("Waiting for instance {} to drain", instance.scheduler_id);
        self.until_healthy(&description, Cadence::POLL, |inventory| {
            let running = inventory
                .plane()
                .list_running_tasks(inventory.cluster(), &instance.scheduler_id)?
                .len();
            Ok(if running == 0 {
                Check::Met
            } else {
                Check::Pending(format!("currently running {} tasks", running))
            })
        })?;
        info!(instance = %instance.scheduler_id, "instance drained");
        Ok(())
    }
}
