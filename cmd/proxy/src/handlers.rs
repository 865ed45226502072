use std::sync::Arc;

use flotilla_model::Protocol;
use flotilla_service_controller::{ProxyAction, ProxyEndpoint, ProxyMessage};
use tracing::{error, info, warn};

use crate::metrics::ProxyMetrics;
use crate::nat::{DispatchMatch, NatBackend};
use crate::rules::{diff_endpoints, endpoint_chain_name, service_chain_name, should_rebuild};
use crate::state::{ProxyState, ServiceRecord};

/// Dispatches one `ProxyMessage` per spec.md §4.4's CREATE/UPDATE/DELETE
/// actions.
pub async fn handle_message(state: &Arc<ProxyState>, nat: &Arc<dyn NatBackend>, metrics: &Arc<ProxyMetrics>, message: ProxyMessage) {
    match message.action {
        ProxyAction::Create => create_service(state, nat, metrics, message).await,
        ProxyAction::Update => update_service(state, nat, metrics, message).await,
        ProxyAction::Delete => delete_service(state, nat, metrics, &message.service_name).await,
    }
}

fn dispatch_matches(message: &ProxyMessage) -> Vec<DispatchMatch> {
    let mut matches = vec![DispatchMatch::ClusterIp {
        ip: message.cluster_ip.clone(),
        port: message.port,
        protocol: message.protocol,
    }];
    if let Some(node_port) = message.node_port {
        matches.push(DispatchMatch::NodePort { port: node_port, protocol: message.protocol });
    }
    matches
}

/// Builds every endpoint chain plus the service's dispatch rules from
/// scratch, mirroring the original's `create_service_rules`: tears down any
/// existing rules for this Service first (the original re-invokes itself on
/// rebuild, so a stale record here is always fully replaced, never merged).
async fn create_service(state: &Arc<ProxyState>, nat: &Arc<dyn NatBackend>, metrics: &Arc<ProxyMetrics>, message: ProxyMessage) {
    if state.get(&message.service_name).is_some() {
        teardown(nat, &state.remove(&message.service_name).unwrap(), &message.service_name).await;
    }

    if message.endpoints.is_empty() {
        warn!(service = %message.service_name, "no endpoints available, skipping rule creation");
        return;
    }

    let service_chain = service_chain_name(&message.service_name);
    if let Err(error) = nat.create_chain(&service_chain).await {
        error!(service = %message.service_name, %error, "failed to create service chain");
        metrics.program_failed();
        return;
    }

    if let Err(error) = program_endpoints(nat, &message.endpoints, message.protocol).await {
        error!(service = %message.service_name, %error, "failed to program endpoint chains");
        metrics.program_failed();
        return;
    }

    let endpoint_chains: Vec<String> = message.endpoints.iter().map(endpoint_chain_name).collect();
    if let Err(error) = nat.program_load_balancing(&service_chain, &endpoint_chains).await {
        error!(service = %message.service_name, %error, "failed to program load balancing");
        metrics.program_failed();
        return;
    }

    for rule in dispatch_matches(&message) {
        if let Err(error) = nat.insert_dispatch_rule(&message.service_name, &service_chain, &rule).await {
            error!(service = %message.service_name, %error, "failed to insert dispatch rule");
            metrics.program_failed();
            return;
        }
    }

    info!(service = %message.service_name, endpoints = message.endpoints.len(), "programmed service rules");
    state.set(
        &message.service_name,
        ServiceRecord {
            service_chain,
            cluster_ip: message.cluster_ip,
            port: message.port,
            protocol: message.protocol,
            node_port: message.node_port,
            endpoints: message.endpoints,
        },
    );
    metrics.program_succeeded();
}

async fn program_endpoints(nat: &Arc<dyn NatBackend>, endpoints: &[ProxyEndpoint], protocol: Protocol) -> Result<(), String> {
    for endpoint in endpoints {
        let chain = endpoint_chain_name(endpoint);
        nat.create_chain(&chain).await?;
        nat.program_endpoint(&chain, &endpoint.ip, endpoint.port, protocol).await?;
    }
    Ok(())
}

/// Incremental update when the change is small, full rebuild otherwise
/// (spec.md §4.4's endpoint-delta algorithm).
async fn update_service(state: &Arc<ProxyState>, nat: &Arc<dyn NatBackend>, metrics: &Arc<ProxyMetrics>, message: ProxyMessage) {
    let Some(existing) = state.get(&message.service_name) else {
        create_service(state, nat, metrics, message).await;
        return;
    };

    let (added, removed) = diff_endpoints(&existing.endpoints, &message.endpoints);
    if added.is_empty() && removed.is_empty() {
        return;
    }

    if should_rebuild(existing.endpoints.len(), added.len(), removed.len()) {
        info!(service = %message.service_name, "endpoint change exceeds half the set, rebuilding");
        create_service(state, nat, metrics, message).await;
        return;
    }

    for endpoint in &removed {
        let chain = endpoint_chain_name(endpoint);
        if let Err(error) = nat.delete_chain(&chain).await {
            warn!(service = %message.service_name, %chain, %error, "failed to delete removed endpoint chain");
        }
    }

    if let Err(error) = program_endpoints(nat, &added, existing.protocol).await {
        error!(service = %message.service_name, %error, "failed to program added endpoints, falling back to rebuild");
        create_service(state, nat, metrics, message).await;
        return;
    }

    let endpoint_chains: Vec<String> = message.endpoints.iter().map(endpoint_chain_name).collect();
    if let Err(error) = nat.program_load_balancing(&existing.service_chain, &endpoint_chains).await {
        error!(service = %message.service_name, %error, "failed to reprogram load balancing");
        metrics.program_failed();
        return;
    }

    info!(
        service = %message.service_name,
        added = added.len(), removed = removed.len(),
        "incrementally updated service endpoints"
    );
    state.set(
        &message.service_name,
        ServiceRecord { endpoints: message.endpoints, ..existing },
    );
    metrics.program_succeeded();
}

async fn delete_service(state: &Arc<ProxyState>, nat: &Arc<dyn NatBackend>, metrics: &Arc<ProxyMetrics>, service_name: &str) {
    let Some(record) = state.remove(service_name) else {
        return;
    };
    teardown(nat, &record, service_name).await;
    info!(service = %service_name, "removed service rules");
    metrics.program_succeeded();
}

async fn teardown(nat: &Arc<dyn NatBackend>, record: &ServiceRecord, service_name: &str) {
    let mut matches = vec![DispatchMatch::ClusterIp {
        ip: record.cluster_ip.clone(),
        port: record.port,
        protocol: record.protocol,
    }];
    if let Some(node_port) = record.node_port {
        matches.push(DispatchMatch::NodePort { port: node_port, protocol: record.protocol });
    }
    for rule in &matches {
        if let Err(error) = nat.remove_dispatch_rule(service_name, &record.service_chain, rule).await {
            warn!(%service_name, %error, "failed to remove dispatch rule during teardown");
        }
    }
    if let Err(error) = nat.delete_chain(&record.service_chain).await {
        warn!(%service_name, %error, "failed to delete service chain during teardown");
    }
    for endpoint in &record.endpoints {
        let chain = endpoint_chain_name(endpoint);
        if let Err(error) = nat.delete_chain(&chain).await {
            warn!(%service_name, %chain, %error, "failed to delete endpoint chain during teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nat::SimulatedNat;

    fn message(action: ProxyAction, endpoints: Vec<ProxyEndpoint>) -> ProxyMessage {
        ProxyMessage {
            action,
            service_name: "svc1".to_string(),
            cluster_ip: "10.96.0.1".to_string(),
            port: 80,
            protocol: Protocol::Tcp,
            endpoints,
            node_port: None,
        }
    }

    fn ep(ip: &str, port: u16) -> ProxyEndpoint {
        ProxyEndpoint { ip: ip.to_string(), port }
    }

    fn harness() -> (Arc<ProxyState>, Arc<dyn NatBackend>, Arc<ProxyMetrics>) {
        (Arc::new(ProxyState::new()), Arc::new(SimulatedNat), Arc::new(ProxyMetrics::new()))
    }

    #[tokio::test]
    async fn create_records_service_with_all_endpoints() {
        let (state, nat, metrics) = harness();
        let msg = message(ProxyAction::Create, vec![ep("10.1.0.1", 8080), ep("10.1.0.2", 8080), ep("10.1.0.3", 8080)]);
        handle_message(&state, &nat, &metrics, msg).await;

        let record = state.get("svc1").expect("service recorded");
        assert_eq!(record.endpoints.len(), 3);
        assert_eq!(record.cluster_ip, "10.96.0.1");
    }

    #[tokio::test]
    async fn create_with_no_endpoints_leaves_no_record() {
        let (state, nat, metrics) = harness();
        handle_message(&state, &nat, &metrics, message(ProxyAction::Create, vec![])).await;
        assert!(state.get("svc1").is_none());
    }

    #[tokio::test]
    async fn update_shrinks_endpoint_set_incrementally() {
        let (state, nat, metrics) = harness();
        handle_message(
            &state, &nat, &metrics,
            message(ProxyAction::Create, vec![ep("10.1.0.1", 8080), ep("10.1.0.2", 8080), ep("10.1.0.3", 8080)]),
        )
        .await;

        handle_message(
            &state, &nat, &metrics,
            message(ProxyAction::Update, vec![ep("10.1.0.1", 8080), ep("10.1.0.2", 8080)]),
        )
        .await;

        let record = state.get("svc1").expect("service still recorded");
        assert_eq!(record.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn update_on_unknown_service_creates_it() {
        let (state, nat, metrics) = harness();
        handle_message(&state, &nat, &metrics, message(ProxyAction::Update, vec![ep("10.1.0.1", 8080)])).await;
        assert_eq!(state.get("svc1").unwrap().endpoints.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let (state, nat, metrics) = harness();
        handle_message(&state, &nat, &metrics, message(ProxyAction::Create, vec![ep("10.1.0.1", 8080)])).await;
        handle_message(&state, &nat, &metrics, message(ProxyAction::Delete, vec![])).await;
        assert!(state.get("svc1").is_none());
    }

    #[tokio::test]
    async fn delete_on_unknown_service_is_a_no_op() {
        let (state, nat, metrics) = harness();
        handle_message(&state, &nat, &metrics, message(ProxyAction::Delete, vec![])).await;
        assert!(state.get("svc1").is_none());
    }
}
