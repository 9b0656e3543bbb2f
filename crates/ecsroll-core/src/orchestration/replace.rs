//! REPLACE: swap every original instance for a freshly launched one.

use tracing::info;

use super::{MaintenanceSession, Position, RollingOrchestrator, Workflow};
use crate::converge::Cadence;
use crate::error::{Result, RollError};
use crate::overflow::find_new_instance;
use crate::types::InstanceRecord;

pub(super) struct ReplaceWorkflow;

impl Workflow for ReplaceWorkflow {
    fn provision(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        session: &mut MaintenanceSession,
    ) -> Result<()> {
        roll.grow(
            session,
            "Increasing ASG size by 1 to maintain cluster capacity during rolling replace",
        )
    }

    fn process(
        &mut self,
        roll: &mut RollingOrchestrator<'_>,
        session: &mut MaintenanceSession,
        position: Position,
        target: &InstanceRecord,
    ) -> Result<()> {
        // Every iteration starts one above the original size: the buffer from
        // provisioning, then the group's replacement for the last termination.
        roll.settle("Waiting for ASG to rightsize ECS cluster", Cadence::SETTLE);
        roll.expect_size(session.original_size() + 1)?;

        let current = roll.snapshot()?;
        let joined = find_new_instance(session.original(), session.replacements(), &current)
            .ok_or(RollError::NoNewInstance {
                observed: current.len(),
            })?;
        roll.await_ready(&joined)?;
        info!(instance = %joined.key(), "new instance is up and joined to the cluster");
        session.record_replacement(joined);
        roll.report("Current cluster members:")?;

        roll.confirm(&format!(
            "Drain and terminate original instance {}/{} {} [{}]?",
            position.index, position.total, target.compute_id, target.scheduler_id
        ))?;
        roll.drain(target)?;

        if position.is_last() {
            // The group picks the last original to remove; the replacements are shielded.
            let survivors = session.replacements().to_vec();
            roll.shrink(session, &survivors, Cadence::DOWNSIZE)
        } else {
            roll.terminate(target)
        }
    }

    fn finish(
        &mut self,
        _roll: &mut RollingOrchestrator<'_>,
        _session: &mut MaintenanceSession,
    ) -> Result<()> {
        Ok(())
    }
}
