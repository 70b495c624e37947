//! Kubernetes client construction.

use std::time::Duration;

use kube::{Client, Config};
use tracing::debug;

use crate::error::AgentError;

/// Build a client from the in-cluster environment or the local kubeconfig.
///
/// Connect and read timeouts are both set to `timeout`, so a stalled API
/// server cannot hold a tick longer than that.
///
/// # Errors
///
/// Returns an error if no configuration can be inferred or the client cannot
/// be constructed from it.
pub async fn build_client(timeout: Duration) -> Result<Client, AgentError> {
    let mut config = Config::infer().await?;
    config.connect_timeout = Some(timeout);
    config.read_timeout = Some(timeout);
    debug!(cluster_url = %config.cluster_url, ?timeout, "Kubernetes client configured");
    Ok(Client::try_from(config)?)
}
