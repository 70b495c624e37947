//! Node marker client.
//!
//! The marker is a label on the node object that tells the rest of the
//! cluster "this node is protected by an armed fencing watchdog". The same
//! client also fetches node annotations for the health prober, so all
//! control-plane traffic goes through one seam.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, PostParams};
use kube::Client;
use tokio::time;
use tracing::{debug, info};

use crate::error::AgentError;

/// Default marker label key.
pub const DEFAULT_MARKER_KEY: &str = "deckhouse.io/fencing-enabled";

/// Default marker label value.
pub const DEFAULT_MARKER_VALUE: &str = "true";

/// Control-plane operations on this agent's node object.
#[async_trait]
pub trait NodeMarker: Send + Sync {
    /// Name of the node this client acts on.
    fn node_name(&self) -> &str;

    /// Fetch the node and return its annotations.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be fetched.
    async fn annotations(&self) -> Result<BTreeMap<String, String>, AgentError>;

    /// Add the marker label (read-modify-write).
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be read or written.
    async fn set_marker(&self) -> Result<(), AgentError>;

    /// Remove the marker label (read-modify-write).
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be read or written.
    async fn remove_marker(&self) -> Result<(), AgentError>;
}

/// Marker label key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLabel {
    /// Label key.
    pub key: String,
    /// Label value.
    pub value: String,
}

impl MarkerLabel {
    /// Create a marker label.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Check whether `node` carries this label with this value.
    #[must_use]
    pub fn is_present(&self, node: &Node) -> bool {
        node.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(&self.key))
            .is_some_and(|value| *value == self.value)
    }

    /// Set the label on `node`. Returns `false` if it was already set.
    pub fn apply(&self, node: &mut Node) -> bool {
        if self.is_present(node) {
            return false;
        }
        node.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(self.key.clone(), self.value.clone());
        true
    }

    /// Remove the label from `node`. Returns `false` if it was absent.
    pub fn strip(&self, node: &mut Node) -> bool {
        node.metadata
            .labels
            .as_mut()
            .and_then(|labels| labels.remove(&self.key))
            .is_some()
    }
}

impl Default for MarkerLabel {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_KEY, DEFAULT_MARKER_VALUE)
    }
}

/// [`NodeMarker`] backed by the Kubernetes API.
///
/// Writes use `replace` with the `resourceVersion` of the fetched object, so
/// a concurrent modification is rejected with 409 and surfaces as
/// [`AgentError::Conflict`].
pub struct KubeNodeMarker {
    api: Api<Node>,
    node_name: String,
    label: MarkerLabel,
    timeout: Duration,
}

impl std::fmt::Debug for KubeNodeMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeNodeMarker")
            .field("node_name", &self.node_name)
            .field("label", &self.label)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl KubeNodeMarker {
    /// Create a client for `node_name`. Every API call is bounded by `timeout`.
    #[must_use]
    pub fn new(
        client: Client,
        node_name: impl Into<String>,
        label: MarkerLabel,
        timeout: Duration,
    ) -> Self {
        Self {
            api: Api::all(client),
            node_name: node_name.into(),
            label,
            timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, AgentError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| AgentError::from_kube(&self.node_name, e)),
            Err(_elapsed) => Err(AgentError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }

    async fn fetch(&self) -> Result<Node, AgentError> {
        self.bounded("get node", self.api.get(&self.node_name)).await
    }

    async fn update(&self, node: &Node) -> Result<(), AgentError> {
        self.bounded(
            "update node",
            self.api.replace(&self.node_name, &PostParams::default(), node),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl NodeMarker for KubeNodeMarker {
    fn node_name(&self) -> &str {
        &self.node_name
    }

    async fn annotations(&self) -> Result<BTreeMap<String, String>, AgentError> {
        let node = self.fetch().await?;
        Ok(node.metadata.annotations.unwrap_or_default())
    }

    async fn set_marker(&self) -> Result<(), AgentError> {
        let mut node = self.fetch().await?;
        if !self.label.apply(&mut node) {
            debug!(node = %self.node_name, label = %self.label.key, "Node label already set");
            return Ok(());
        }
        self.update(&node).await?;
        info!(node = %self.node_name, label = %self.label.key, "Set node label");
        Ok(())
    }

    async fn remove_marker(&self) -> Result<(), AgentError> {
        let mut node = self.fetch().await?;
        if !self.label.strip(&mut node) {
            debug!(node = %self.node_name, label = %self.label.key, "Node label already absent");
            return Ok(());
        }
        self.update(&node).await?;
        info!(node = %self.node_name, label = %self.label.key, "Removed node label");
        Ok(())
    }
}
