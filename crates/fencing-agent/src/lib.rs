//! Node self-fencing agent.
//!
//! The agent arms a watchdog and keeps feeding it only while the Kubernetes
//! API confirms that the node object is reachable. When the node loses the
//! control plane the feeds stop and the watchdog reboots the machine. A
//! marker label on the node tells the rest of the cluster that the node is
//! protected; it is present only while the watchdog is armed.
//!
//! Maintenance annotations on the node suspend fencing: the watchdog is
//! disarmed and the marker removed until the annotations go away.
//!
//! # Components
//!
//! - [`NodeMarker`] / [`KubeNodeMarker`]: node label and annotation access
//! - [`HealthProber`]: one probe per tick, classifies the control plane
//! - [`FencingSupervisor`]: the state machine tying the two to a
//!   [`fencing_watchdog::WatchdogDriver`]
//! - [`AgentConfig`]: flags and environment variables
//! - [`health_server`]: `/healthz`, `/readyz` and `/status`

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod health_server;
pub mod marker;
pub mod observability;
pub mod prober;
pub mod supervisor;

pub use config::{AgentConfig, ConfigError, DriverSelection, LogFormat};
pub use error::{AgentError, SupervisorError};
pub use marker::{KubeNodeMarker, MarkerLabel, NodeMarker};
pub use prober::{HealthProber, HealthSample};
pub use supervisor::{
    ArmState, FencingSupervisor, Phase, SupervisorMode, SupervisorSettings, SupervisorStatus,
};
