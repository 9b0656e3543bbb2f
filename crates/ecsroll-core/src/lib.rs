//! ecsroll Core Library
//!
//! Rolling REPLACE and REBOOT maintenance of the instances backing a
//! container cluster, keeping capacity at or above its original size.

pub mod capacity;
pub mod config;
pub mod control_plane;
pub mod converge;
pub mod error;
pub mod gate;
pub mod inventory;
pub mod orchestration;
pub mod overflow;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{Provider, RollConfig};

    // Control plane
    pub use crate::control_plane::{AwsCli, ControlPlane, SimCall, SimulatedCloud};

    // Errors
    pub use crate::error::{MANUAL_CLEANUP_HINT, RollError};

    // Operator seams
    pub use crate::converge::Pacer;
    pub use crate::gate::Prompter;
    pub use crate::orchestration::{OperatorIo, Reporter, RollReport, RollingOrchestrator};

    // Data model
    pub use crate::inventory::ClusterSnapshot;
    pub use crate::types::{
        Action, CapacityBounds, HealthStatus, InstanceKey, InstanceRecord, InstanceStatus,
    };
}
