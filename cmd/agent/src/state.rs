use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use flotilla_api_client::FlotillaClient;
use flotilla_model::Pod;

use crate::engine::ContainerEngine;
use crate::ipam::OverlayIpAllocator;
use crate::volumes::VolumeResolver;

/// What the agent remembers locally about one Pod it is running, independent
/// of the API server's copy — used by the reconcile pass and by DELETE/UPDATE
/// handling to know what to tear down.
#[derive(Debug, Clone, Default)]
pub struct LocalPodRecord {
    pub container_ids: Vec<String>,
    pub overlay_ip: Option<Ipv4Addr>,
    pub mount_points: Vec<String>,
}

fn pod_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Everything shared between the agent's registration, heartbeat,
/// bus-consumer, and reconcile tasks.
pub struct AgentState {
    pub client: FlotillaClient,
    pub engine: Box<dyn ContainerEngine>,
    pub volumes: VolumeResolver,
    pub ips: OverlayIpAllocator,
    pub node_name: String,
    pods: Mutex<HashMap<String, LocalPodRecord>>,
}

impl AgentState {
    pub fn new(
        client: FlotillaClient,
        engine: Box<dyn ContainerEngine>,
        volumes: VolumeResolver,
        node_name: String,
    ) -> Self {
        Self {
            client,
            engine,
            volumes,
            ips: OverlayIpAllocator::new(),
            node_name,
            pods: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_pod(&self, namespace: &str, name: &str, record: LocalPodRecord) {
        self.pods.lock().expect("pod table lock poisoned").insert(pod_key(namespace, name), record);
    }

    pub fn pod_record(&self, namespace: &str, name: &str) -> Option<LocalPodRecord> {
        self.pods.lock().expect("pod table lock poisoned").get(&pod_key(namespace, name)).cloned()
    }

    pub fn remove_pod(&self, namespace: &str, name: &str) -> Option<LocalPodRecord> {
        self.pods.lock().expect("pod table lock poisoned").remove(&pod_key(namespace, name))
    }

    /// `(namespace, name, record)` for every Pod the agent currently tracks,
    /// for the reconcile pass.
    pub fn all_pods(&self) -> Vec<(String, String, LocalPodRecord)> {
        self.pods
            .lock()
            .expect("pod table lock poisoned")
            .iter()
            .filter_map(|(key, record)| {
                let (namespace, name) = key.split_once('/')?;
                Some((namespace.to_string(), name.to_string(), record.clone()))
            })
            .collect()
    }
}

/// Picks the container image/command/ports/resources/security context for
/// the pause/infra container every Pod gets before its declared containers,
/// so siblings can share its network namespace (spec.md §4.3).
pub fn pause_container_name(pod: &Pod) -> String {
    format!("{}-{}-pause", pod.meta.namespace.as_deref().unwrap_or("default"), pod.meta.name)
}

pub fn container_name(pod: &Pod, container_name: &str) -> String {
    format!("{}-{}-{container_name}", pod.meta.namespace.as_deref().unwrap_or("default"), pod.meta.name)
}
