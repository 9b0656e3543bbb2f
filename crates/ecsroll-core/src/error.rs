//! Error taxonomy for a maintenance run.

use thiserror::Error;

/// Guidance shown whenever a run stops before the cluster is back to its original size.
pub const MANUAL_CLEANUP_HINT: &str =
    "Please review output, and take any manual steps needed to normalize the environment.";

/// Every way a maintenance run can stop early. All of them are fatal.
#[derive(Debug, Error)]
pub enum RollError {
    #[error("ECS cluster '{cluster}' does not exist in the targeted environment")]
    ClusterNotFound { cluster: String },

    #[error("instances of cluster '{cluster}' are not associated with any capacity group")]
    NoCapacityGroup { cluster: String },

    #[error(
        "instances of cluster '{cluster}' ({}) are not associated with a single capacity group: [{}]",
        .instances.join(", "),
        .groups.join(", ")
    )]
    AmbiguousCapacityGroup {
        cluster: String,
        instances: Vec<String>,
        groups: Vec<String>,
    },

    #[error("capacity group '{group}' cannot be resized to min={min} desired={desired} max={max}")]
    InvalidCapacity {
        group: String,
        min: i64,
        max: i64,
        desired: i64,
    },

    #[error("instance {compute_id} disappeared from the cluster while waiting on it")]
    InstanceVanished { compute_id: String },

    #[error("no newly launched instance found among {observed} cluster members")]
    NoNewInstance { observed: usize },

    #[error("expected exactly one overflow instance, found {} ({})", .found.len(), .found.join(", "))]
    UnexpectedOverflow { found: Vec<String> },

    #[error("aborted by operator at: {prompt}")]
    Aborted { prompt: String },

    #[error("operator prompt failed: {0:#}")]
    Prompt(anyhow::Error),

    #[error("control plane request failed: {0:#}")]
    ControlPlane(#[from] anyhow::Error),
}

impl RollError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Whether the operator may have to clean up capacity or protection state by hand.
    pub fn needs_manual_cleanup(&self) -> bool {
        !matches!(
            self,
            RollError::ClusterNotFound { .. }
                | RollError::NoCapacityGroup { .. }
                | RollError::AmbiguousCapacityGroup { .. }
        )
    }
}

pub type Result<T, E = RollError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_exits_with_two() {
        let errors = [
            RollError::ClusterNotFound {
                cluster: "c".to_string(),
            },
            RollError::Aborted {
                prompt: "go?".to_string(),
            },
            RollError::ControlPlane(anyhow::anyhow!("boom")),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn preconditions_need_no_cleanup() {
        let err = RollError::NoCapacityGroup {
            cluster: "c".to_string(),
        };
        assert!(!err.needs_manual_cleanup());
        let err = RollError::UnexpectedOverflow { found: vec![] };
        assert!(err.needs_manual_cleanup());
    }

    #[test]
    fn ambiguous_group_lists_members() {
        let err = RollError::AmbiguousCapacityGroup {
            cluster: "prod".to_string(),
            instances: vec!["i-1".to_string(), "i-2".to_string()],
            groups: vec!["asg-a".to_string(), "asg-b".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("i-1, i-2"));
        assert!(message.contains("[asg-a, asg-b]"));
    }
}
