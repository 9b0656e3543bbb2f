//! Set differences between snapshots, by identifier pair.

use crate::inventory::ClusterSnapshot;
use crate::types::InstanceRecord;

/// Members of `current` whose identifier pair is absent from `original`, in `current` order.
pub fn overflow(original: &ClusterSnapshot, current: &ClusterSnapshot) -> Vec<InstanceRecord> {
    current
        .iter()
        .filter(|record| !original.contains(&record.key()))
        .cloned()
        .collect()
}

/// The first member of `current` that is neither an original nor an already recorded replacement.
pub fn find_new_instance(
    original: &ClusterSnapshot,
    replacements: &[InstanceRecord],
    current: &ClusterSnapshot,
) -> Option<InstanceRecord> {
    current
        .iter()
        .find(|record| {
            let key = record.key();
            !original.contains(&key) && !replacements.iter().any(|r| r.matches(&key))
        })
        .cloned()
}
