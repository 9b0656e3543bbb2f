//! REBOOT: restart every original instance in place, behind one buffer instance.

use super::{MaintenanceSession, Position, RollingOrchestrator, Workflow};
use crate::converge::Cadence;
use crate::error::{Result, RollError};
use crate::overflow::overflow;
use crate::types::{InstanceRecord, InstanceStatus};

/// Each instance is rebooted twice.
const REBOOT_PASSES: usize = 2;

pub(super) struct RebootWorkflow;

impl Workflow for RebootWorkflow {
    fn provision(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        session: &mut MaintenanceSession,
    ) -> Result<()> {
        roll.grow(
            session,
            "Increasing ASG size by 1 to maintain cluster capacity during rolling reboot",
        )?;
        roll.settle("Waiting for ASG to upsize ECS cluster", Cadence::SETTLE);
        roll.expect_size(session.original_size() + 1)?;
        roll.report("ECS cluster now has the expected number of instances:")?;
        roll.confirm("Capacity has been increased; perform rolling reboot of original instances?")
    }

    fn process(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        _session: &mut MaintenanceSession,
        _position: Position,
        target: &InstanceRecord,
    ) -> Result<()> {
        roll.drain(target)?;
        for pass in 1..=REBOOT_PASSES {
            roll.reboot(target, pass)?;
            roll.await_ready(target)?;
        }
        roll.set_status(target, &InstanceStatus::Active)?;
        roll.expect_status(target, &InstanceStatus::Active)?;
        roll.report("Current state of cluster:")
    }

    fn finish(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        session: &mut MaintenanceSession,
    ) -> Result<()> {
        roll.confirm(
            "Reboots completed; return cluster to original size by draining and terminating overflow instance?",
        )?;

        let current = roll.snapshot()?;
        let mut found = overflow(session.original(), &current);
        if found.len() != 1 {
            return Err(RollError::UnexpectedOverflow {
                found: found.into_iter().map(|r| r.compute_id).collect(),
            });
        }
        let buffer = found.remove(0);
        roll.drain(&buffer)?;
        session.record_overflow(buffer);

        let survivors = session.original().records().to_vec();
        roll.shrink(session, &survivors, Cadence::SETTLE)
    }
}
