use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::ObjectMeta;

/// Liveness as tracked by the API server's node-timeout housekeeping loop
/// (spec.md §4.1): a node flips to `Offline` once its heartbeat goes stale.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NodeStatus {
    Online,
    Offline,
}

/// A registered node agent. `pod_topic`/`service_topic` are the per-node message
/// bus topics the scheduler and proxy publish commands to (spec.md §5).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub meta: ObjectMeta,
    pub advertised_address: String,
    pub status: NodeStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub pod_topic: String,
    pub service_topic: String,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        advertised_address: impl Into<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        let name = name.into();
        let pod_topic = format!("node.{name}.pods");
        let service_topic = format!("node.{name}.services");
        Self {
            meta: ObjectMeta::new(name, None).with_labels(labels),
            advertised_address: advertised_address.into(),
            status: NodeStatus::Online,
            last_heartbeat: Utc::now(),
            pod_topic,
            service_topic,
        }
    }

    /// True once `last_heartbeat` is older than `timeout`, per the node-timeout
    /// housekeeping loop in spec.md §4.1.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat) > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_derived_from_name() {
        let node = Node::new("n1", "10.0.0.1:9000", BTreeMap::new());
        assert_eq!(node.pod_topic, "node.n1.pods");
        assert_eq!(node.service_topic, "node.n1.services");
    }

    #[test]
    fn staleness_is_relative_to_last_heartbeat() {
        let mut node = Node::new("n1", "10.0.0.1:9000", BTreeMap::new());
        node.last_heartbeat = Utc::now() - chrono::Duration::seconds(60);
        assert!(node.is_stale(Utc::now(), chrono::Duration::seconds(30)));
        assert!(!node.is_stale(Utc::now(), chrono::Duration::seconds(120)));
    }
}
