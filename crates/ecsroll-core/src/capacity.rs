//! Capacity group size bounds and scale-in protection.

use std::collections::BTreeSet;

use tracing::info;

use crate::control_plane::ControlPlane;
use crate::error::{Result, RollError};
use crate::inventory::ClusterSnapshot;
use crate::types::{CapacityBounds, CapacityGroup, InstanceRecord};

#[derive(Clone, Copy)]
pub struct CapacityCoordinator<'a> {
    plane: &'a dyn ControlPlane,
}

impl<'a> CapacityCoordinator<'a> {
    pub fn new(plane: &'a dyn ControlPlane) -> Self {
        Self { plane }
    }

    pub fn describe(&self, group: &str) -> Result<CapacityGroup> {
        let bounds = self.plane.describe_capacity_group(group)?;
        Ok(CapacityGroup {
            name: group.to_string(),
            bounds,
        })
    }

    /// Shift min, max and desired by the same signed `delta`.
    ///
    /// Reads the current bounds first, so repeated bumps compose. Nothing is
    /// written if the result would violate `0 <= min <= desired <= max`.
    pub fn bump(&self, group: &str, delta: i64) -> Result<CapacityBounds> {
        let current = self.plane.describe_capacity_group(group)?;
        let next = current.shifted(delta);
        if !next.is_valid() {
            return Err(RollError::InvalidCapacity {
                group: group.to_string(),
                min: next.min,
                max: next.max,
                desired: next.desired,
            });
        }
        info!(group, delta, from = %current, to = %next, "updating capacity group bounds");
        self.plane.update_capacity_group(group, next)?;
        Ok(next)
    }

    /// Mark `instances` as protected (or not) from scale-in removal.
    pub fn set_protection(
        &self,
        group: &str,
        instances: &[InstanceRecord],
        protected: bool,
    ) -> Result<()> {
        let compute_ids: Vec<String> = instances.iter().map(|i| i.compute_id.clone()).collect();
        info!(
            group,
            protected,
            instances = %compute_ids.join(", "),
            "setting scale-in protection"
        );
        self.plane
            .set_scale_in_protection(group, &compute_ids, protected)?;
        Ok(())
    }

    /// The unique capacity group managing the snapshot's instances.
    pub fn resolve_single_group(&self, cluster: &str, snapshot: &ClusterSnapshot) -> Result<String> {
        let members: BTreeSet<String> = snapshot.compute_ids().into_iter().collect();
        let mut groups = BTreeSet::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self.plane.list_group_memberships(next_token.as_deref())?;
            groups.extend(
                page.items
                    .into_iter()
                    .filter(|m| members.contains(&m.compute_id))
                    .map(|m| m.group),
            );
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        let mut groups: Vec<String> = groups.into_iter().collect();
        match groups.len() {
            0 => Err(RollError::NoCapacityGroup {
                cluster: cluster.to_string(),
            }),
            1 => Ok(groups.remove(0)),
            _ => Err(RollError::AmbiguousCapacityGroup {
                cluster: cluster.to_string(),
                instances: snapshot.compute_ids(),
                groups,
            }),
        }
    }
}
