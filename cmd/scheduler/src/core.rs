use flotilla_api_client::{ClientError, FlotillaClient};
use flotilla_model::{Node, NodeStatus, Pod};
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::metrics::SchedulerMetrics;

/// Filters `nodes` to those online and whose labels are a superset of the
/// Pod's `nodeSelector`, then picks uniformly at random — the same
/// filter-then-pick shape as Stellar-K8s's `Scheduler::filter_nodes` /
/// `schedule_pod`, minus its scoring stage (spec.md §4.2 names no scoring
/// function, only "filters... then picks uniformly at random").
pub fn pick_node<'a>(nodes: &'a [Node], pod: &Pod) -> Option<&'a Node> {
    let candidates: Vec<&Node> = nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Online)
        .filter(|n| n.meta.labels_match(&pod.spec.node_selector))
        .collect();
    candidates.choose(&mut rand::thread_rng()).copied()
}

/// Attempts to bind one delivered Pod. Returns whether the caller should ack
/// the delivery (commit its offset): `true` on a successful bind or when the
/// Pod was deleted before the bind landed (spec.md §4.2: "the scheduler
/// swallows the not-found and commits"); `false` when no candidate Node is
/// available yet, or the bind call itself failed transiently — both leave the
/// delivery pending for redelivery on the next poll.
pub async fn schedule_one(client: &FlotillaClient, metrics: &SchedulerMetrics, pod: &Pod) -> bool {
    let name = &pod.meta.name;
    let namespace = match &pod.meta.namespace {
        Some(namespace) => namespace,
        None => {
            warn!(pod = %name, "pending pod has no namespace, dropping");
            return true;
        }
    };

    if pod.status.node_name.is_some() {
        info!(pod = %name, namespace, "pod already bound, acking stale redelivery");
        return true;
    }

    let nodes = match client.list_nodes().await {
        Ok(nodes) => nodes,
        Err(error) => {
            warn!(pod = %name, namespace, %error, "failed to list nodes, will retry");
            return false;
        }
    };

    let Some(node) = pick_node(&nodes, pod) else {
        warn!(pod = %name, namespace, "no candidate node online for pod's selector, will retry");
        return false;
    };
    let node_name = node.meta.name.clone();

    match client.bind_pod_to_node(namespace, name, &node_name).await {
        Ok(_) => {
            metrics.bind_succeeded();
            info!(pod = %name, namespace, node = %node_name, "bound pod to node");
            true
        }
        Err(ClientError::NotFound(_)) => {
            info!(pod = %name, namespace, "pod deleted before bind landed, swallowing");
            true
        }
        Err(error) => {
            metrics.bind_failed();
            warn!(pod = %name, namespace, node = %node_name, %error, "bind failed, will retry");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use flotilla_model::{ObjectMeta, Pod, PodSpec};

    use super::*;

    fn node(name: &str, status: NodeStatus, labels: &[(&str, &str)]) -> Node {
        let labels = labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let mut node = Node::new(name, "10.0.0.1:9000", labels);
        node.status = status;
        node
    }

    fn pod_with_selector(selector: &[(&str, &str)]) -> Pod {
        let mut pod = Pod::new(ObjectMeta::new("p1", Some("default".to_string())), PodSpec::default());
        pod.spec.node_selector = selector.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>();
        pod
    }

    #[test]
    fn excludes_offline_nodes() {
        let nodes = vec![node("n1", NodeStatus::Offline, &[])];
        let pod = pod_with_selector(&[]);
        assert!(pick_node(&nodes, &pod).is_none());
    }

    #[test]
    fn excludes_nodes_missing_selector_labels() {
        let nodes = vec![node("n1", NodeStatus::Online, &[("zone", "a")])];
        let pod = pod_with_selector(&[("zone", "b")]);
        assert!(pick_node(&nodes, &pod).is_none());
    }

    #[test]
    fn picks_a_matching_online_node() {
        let nodes = vec![
            node("n1", NodeStatus::Online, &[("zone", "a")]),
            node("n2", NodeStatus::Offline, &[("zone", "a")]),
        ];
        let pod = pod_with_selector(&[("zone", "a")]);
        assert_eq!(pick_node(&nodes, &pod).map(|n| n.meta.name.as_str()), Some("n1"));
    }
}
