//! Run configuration passed explicitly into the orchestrator.

use std::time::Duration;

use crate::types::Action;

pub const DEFAULT_CLUSTER: &str = "test-ecs-cluster";
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_WAIT_SECS: u64 = 30;

/// How control-plane credentials are obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// A named profile from the provider's shared config.
    Profile(String),
    /// Whatever the process environment supplies.
    Environment,
}

impl Default for Provider {
    fn default() -> Self {
        Provider::Profile(DEFAULT_PROFILE.to_string())
    }
}

impl Provider {
    pub fn profile(&self) -> Option<&str> {
        match self {
            Provider::Profile(name) => Some(name),
            Provider::Environment => None,
        }
    }
}

/// Configuration for a single maintenance run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollConfig {
    pub cluster: String,
    pub action: Action,
    /// Base unit of every wait cycle.
    pub wait: Duration,
    /// Answer yes to every confirmation.
    pub assume_yes: bool,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            cluster: DEFAULT_CLUSTER.to_string(),
            action: Action::default(),
            wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            assume_yes: false,
        }
    }
}

impl RollConfig {
    pub fn new(cluster: impl Into<String>, action: Action) -> Self {
        Self {
            cluster: cluster.into(),
            action,
            ..Default::default()
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = RollConfig::default();
        assert_eq!(config.cluster, "test-ecs-cluster");
        assert_eq!(config.action, Action::Replace);
        assert_eq!(config.wait, Duration::from_secs(30));
        assert!(!config.assume_yes);
        assert_eq!(Provider::default().profile(), Some("default"));
    }

    #[test]
    fn builder_overrides() {
        let config = RollConfig::new("prod", Action::Reboot)
            .with_wait(Duration::from_secs(1))
            .with_assume_yes(true);
        assert_eq!(config.cluster, "prod");
        assert_eq!(config.action, Action::Reboot);
        assert_eq!(config.wait, Duration::from_secs(1));
        assert!(config.assume_yes);
        assert_eq!(Provider::Environment.profile(), None);
    }
}
