use flotilla_model::Protocol;
use serde::{Deserialize, Serialize};

/// A concrete endpoint a Service currently forwards to (spec.md §4.5 step 3).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProxyEndpoint {
    pub ip: String,
    pub port: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyAction {
    Create,
    Update,
    Delete,
}

/// The message published onto a node's `serviceproxy.<node>` topic
/// (spec.md §4.5 step 4, §6): `{action, service_name, cluster_ip, port,
/// protocol, endpoints, node_port}`. Shared between `flotilla-service-controller`
/// (producer) and `cmd/proxy` (consumer).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyMessage {
    pub action: ProxyAction,
    pub service_name: String,
    pub cluster_ip: String,
    pub port: u16,
    pub protocol: Protocol,
    pub endpoints: Vec<ProxyEndpoint>,
    pub node_port: Option<u16>,
}
