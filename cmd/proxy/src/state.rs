use std::collections::HashMap;
use std::sync::Mutex;

use flotilla_model::Protocol;
use flotilla_service_controller::ProxyEndpoint;

/// What this proxy remembers about one Service it has programmed rules for —
/// enough to compute the next endpoint delta and to tear everything down on
/// DELETE, mirroring the original's `self.service_chains`/
/// `self.endpoint_chains` dicts.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub service_chain: String,
    pub cluster_ip: String,
    pub port: u16,
    pub protocol: Protocol,
    pub node_port: Option<u16>,
    pub endpoints: Vec<ProxyEndpoint>,
}

#[derive(Default)]
pub struct ProxyState {
    services: Mutex<HashMap<String, ServiceRecord>>,
}

impl ProxyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, service_name: &str) -> Option<ServiceRecord> {
        self.services.lock().expect("proxy state lock poisoned").get(service_name).cloned()
    }

    pub fn set(&self, service_name: &str, record: ServiceRecord) {
        self.services.lock().expect("proxy state lock poisoned").insert(service_name.to_string(), record);
    }

    pub fn remove(&self, service_name: &str) -> Option<ServiceRecord> {
        self.services.lock().expect("proxy state lock poisoned").remove(service_name)
    }
}
