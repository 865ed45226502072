use flotilla_model::Pod;
use serde::{Deserialize, Serialize};

/// A command published on a node's `pod.<node>` topic (spec.md §6), consumed by
/// the node agent. Lives here rather than in `flotilla-model` because it is a
/// transient bus message between the API server and one binary (the node
/// agent), not a persisted API object — the same reasoning that keeps
/// `ProxyMessage` out of `flotilla-model` in `flotilla-service-controller`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum PodCommand {
    Add { pod: Pod },
    Update { pod: Pod },
    Delete { namespace: String, name: String },
    Heartbeat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_round_trips_through_json() {
        let pod = Pod::new(
            flotilla_model::ObjectMeta::new("web-0", Some("default".into())),
            flotilla_model::PodSpec::default(),
        );
        let command = PodCommand::Add { pod };
        let bytes = serde_json::to_vec(&command).unwrap();
        let decoded: PodCommand = serde_json::from_slice(&bytes).unwrap();
        assert!(matches!(decoded, PodCommand::Add { .. }));
    }

    #[test]
    fn delete_carries_no_spec() {
        let command = PodCommand::Delete { namespace: "default".into(), name: "web-0".into() };
        let bytes = serde_json::to_vec(&command).unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains("\"spec\""));
    }
}
