//! Error types for the fencing agent.

use std::time::Duration;

use fencing_watchdog::WatchdogError;
use thiserror::Error;

/// Errors raised by a single agent operation.
///
/// Inside the supervision loop every one of these is tick-local: it is
/// logged and the operation is retried on the next tick.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Watchdog driver failure.
    #[error("Watchdog error: {0}")]
    Watchdog(#[from] WatchdogError),

    /// Kubernetes API failure.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubernetes client configuration could not be inferred.
    #[error("Kubernetes client configuration error: {0}")]
    KubeConfig(#[from] kube::config::InferConfigError),

    /// The node object does not exist.
    #[error("Node {node} not found")]
    NodeNotFound {
        /// Node name.
        node: String,
    },

    /// The node object changed between read and write.
    #[error("Conflicting update of node {node}")]
    Conflict {
        /// Node name.
        node: String,
    },

    /// A control-plane call did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being attempted.
        operation: &'static str,
        /// Configured bound.
        after: Duration,
    },
}

impl AgentError {
    /// Classify a Kubernetes error for `node`.
    #[must_use]
    pub fn from_kube(node: &str, error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 404 => Self::NodeNotFound {
                node: node.to_owned(),
            },
            kube::Error::Api(response) if response.code == 409 => Self::Conflict {
                node: node.to_owned(),
            },
            _ => Self::Kube(error),
        }
    }
}

/// Terminal outcome of [`FencingSupervisor::run`](crate::FencingSupervisor::run).
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The watchdog could not be armed, or the marker could not be set right
    /// after arming. The process must not keep running unprotected.
    #[error("Failed to arm fencing: {0}")]
    Startup(#[source] AgentError),

    /// Marker removal or disarm failed during graceful shutdown.
    #[error("Shutdown incomplete: {0}")]
    Shutdown(#[source] AgentError),
}
