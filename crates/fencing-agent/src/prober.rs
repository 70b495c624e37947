//! Control-plane health prober.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::marker::NodeMarker;

/// Annotations that put a node into maintenance mode by default.
pub const DEFAULT_MAINTENANCE_ANNOTATIONS: &[&str] = &[
    "update.node.deckhouse.io/disruption-approved",
    "node-manager.deckhouse.io/fencing-disable",
];

/// Outcome of one probe. Discarded after the tick that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSample {
    /// The node object could be fetched.
    pub reachable: bool,
    /// A maintenance annotation is present (or was, if unreachable).
    pub in_maintenance: bool,
}

/// Classifies the control plane as reachable or not, and the node as under
/// maintenance or not.
///
/// Holds only its configuration; an unreachable control plane is reported in
/// the sample, never as an error.
pub struct HealthProber {
    marker: Arc<dyn NodeMarker>,
    maintenance_annotations: Vec<String>,
}

impl std::fmt::Debug for HealthProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProber")
            .field("node", &self.marker.node_name())
            .field("maintenance_annotations", &self.maintenance_annotations)
            .finish()
    }
}

impl HealthProber {
    /// Create a prober that treats any of `maintenance_annotations` as a
    /// maintenance signal.
    #[must_use]
    pub fn new(marker: Arc<dyn NodeMarker>, maintenance_annotations: Vec<String>) -> Self {
        Self {
            marker,
            maintenance_annotations,
        }
    }

    /// Check whether `annotations` contain any maintenance key.
    #[must_use]
    pub fn is_in_maintenance(&self, annotations: &BTreeMap<String, String>) -> bool {
        self.maintenance_annotations
            .iter()
            .any(|key| annotations.contains_key(key))
    }

    /// Fetch the node once and classify the result.
    ///
    /// When the fetch fails, `last_known_maintenance` is echoed back so an
    /// outage does not look like the end of a maintenance window.
    pub async fn probe(&self, last_known_maintenance: bool) -> HealthSample {
        match self.marker.annotations().await {
            Ok(annotations) => {
                let in_maintenance = self.is_in_maintenance(&annotations);
                debug!(node = %self.marker.node_name(), in_maintenance, "Node check - OK");
                HealthSample {
                    reachable: true,
                    in_maintenance,
                }
            }
            Err(e) => {
                error!(node = %self.marker.node_name(), error = %e, "Can't reach API");
                HealthSample {
                    reachable: false,
                    in_maintenance: last_known_maintenance,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticNode(Option<BTreeMap<String, String>>);

    #[async_trait]
    impl NodeMarker for StaticNode {
        fn node_name(&self) -> &str {
            "worker-0"
        }

        async fn annotations(&self) -> Result<BTreeMap<String, String>, AgentError> {
            self.0.clone().ok_or(AgentError::Timeout {
                operation: "get node",
                after: Duration::from_secs(1),
            })
        }

        async fn set_marker(&self) -> Result<(), AgentError> {
            Ok(())
        }

        async fn remove_marker(&self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    fn prober(annotations: Option<Vec<(&str, &str)>>) -> HealthProber {
        let annotations = annotations.map(|pairs| {
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect()
        });
        HealthProber::new(
            Arc::new(StaticNode(annotations)),
            DEFAULT_MAINTENANCE_ANNOTATIONS
                .iter()
                .map(|key| (*key).to_owned())
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_reachable_without_annotations() {
        let sample = prober(Some(vec![])).probe(true).await;
        assert_eq!(
            sample,
            HealthSample {
                reachable: true,
                in_maintenance: false,
            }
        );
    }

    #[tokio::test]
    async fn test_any_maintenance_key_counts() {
        let sample = prober(Some(vec![
            ("unrelated", "x"),
            ("node-manager.deckhouse.io/fencing-disable", ""),
        ]))
        .probe(false)
        .await;
        assert!(sample.reachable);
        assert!(sample.in_maintenance);
    }

    #[tokio::test]
    async fn test_unreachable_echoes_last_known() {
        let prober = prober(None);

        let sample = prober.probe(true).await;
        assert!(!sample.reachable);
        assert!(sample.in_maintenance);

        let sample = prober.probe(false).await;
        assert!(!sample.reachable);
        assert!(!sample.in_maintenance);
    }
}
