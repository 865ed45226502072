use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use flotilla_api_client::FlotillaClient;
use flotilla_model::{Kind, ObjectKey, Pod, PodPhase, Service, ServiceType};
use flotilla_store::{MessageBus, TypedBus};

use crate::ipam::allocate_cluster_ip;
use crate::nodeport::NodePortManager;
use crate::wire::{ProxyAction, ProxyEndpoint, ProxyMessage};

/// Selects Pods in the same namespace whose labels are a superset of the
/// Service selector and whose status is RUNNING with an assigned subnet IP
/// (spec.md §4.5 bullet 3). Shared by the reconcile loop and the API server's
/// read-only endpoint introspection route so the two never drift apart.
pub fn compute_endpoints(service: &Service, pods: &[Pod]) -> Vec<ProxyEndpoint> {
    pods.iter()
        .filter(|p| p.meta.labels_match(&service.spec.selector))
        .filter(|p| matches!(p.status.phase, Some(PodPhase::Running)))
        .filter_map(|p| {
            p.status
                .subnet_ip
                .clone()
                .map(|ip| ProxyEndpoint { ip, port: service.spec.port.target_port })
        })
        .collect()
}

pub async fn list_targets(client: &FlotillaClient) -> Result<Vec<ObjectKey>, String> {
    let all: Vec<Service> = client.list_all("services").await.map_err(|e| e.to_string())?;
    Ok(all
        .into_iter()
        .map(|svc| {
            ObjectKey::namespaced(Kind::Service, svc.meta.namespace.unwrap_or_default(), svc.meta.name)
        })
        .collect())
}

async fn assign_cluster_ip(client: &FlotillaClient, service: &mut Service) -> Result<bool, String> {
    if service.status.cluster_ip.is_some() {
        return Ok(false);
    }
    let all: Vec<Service> = client.list_all("services").await.map_err(|e| e.to_string())?;
    let used: BTreeSet<Ipv4Addr> = all
        .iter()
        .filter_map(|s| s.status.cluster_ip.as_deref())
        .filter_map(|ip| ip.parse().ok())
        .collect();
    match allocate_cluster_ip(&used) {
        Some(ip) => {
            service.status.cluster_ip = Some(ip.to_string());
            Ok(true)
        }
        None => Err("clusterIP pool exhausted".to_string()),
    }
}

async fn assign_node_port(
    nodeports: &NodePortManager,
    service_key: &str,
    service: &mut Service,
) -> Result<(), String> {
    if service.spec.type_ != ServiceType::NodePort {
        return Ok(());
    }
    let requested = service.spec.port.node_port;
    let port = nodeports
        .allocate(service_key, requested)
        .await
        .map_err(|e| e.to_string())?;
    service.spec.port.node_port = Some(port);
    Ok(())
}

pub async fn reconcile(
    client: &FlotillaClient,
    bus: &Arc<dyn MessageBus>,
    nodeports: &NodePortManager,
    key: &ObjectKey,
) -> Result<(), String> {
    let namespace = key.namespace.clone().ok_or("Service must be namespaced")?;
    let name = key.name.clone();

    let mut service = match client
        .get_service(&namespace, &name)
        .await
        .map_err(|e| e.to_string())?
    {
        Some(service) => service,
        None => return Ok(()),
    };

    let newly_assigned = assign_cluster_ip(client, &mut service).await?;
    assign_node_port(nodeports, &key.to_string(), &mut service).await?;

    let service = client
        .update_service(&namespace, &name, &service)
        .await
        .map_err(|e| e.to_string())?;

    let cluster_ip = service
        .status
        .cluster_ip
        .clone()
        .ok_or("clusterIP missing after assignment")?;

    let pods = client
        .list_namespace_pods(&namespace)
        .await
        .map_err(|e| e.to_string())?;
    let endpoints = compute_endpoints(&service, &pods);

    let nodes = client.list_nodes().await.map_err(|e| e.to_string())?;
    let action = if newly_assigned {
        ProxyAction::Create
    } else {
        ProxyAction::Update
    };
    let message = ProxyMessage {
        action,
        service_name: name.clone(),
        cluster_ip,
        port: service.spec.port.port,
        protocol: service.spec.port.protocol,
        endpoints,
        node_port: service.spec.port.node_port,
    };

    let typed_bus = TypedBus::new(bus.as_ref());
    for node in nodes {
        if let Err(err) = typed_bus.publish(&node.service_topic, &message).await {
            tracing::warn!(node = %node.meta.name, %err, "failed to publish proxy update");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_model::{ObjectMeta, Pod, PodSpec, PodStatus};
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn endpoint_filter_requires_running_and_selector_match() {
        let selector = labels(&[("app", "web")]);
        let running_match = Pod {
            meta: ObjectMeta::new("p1", Some("default".into())).with_labels(labels(&[("app", "web")])),
            spec: PodSpec::default(),
            status: PodStatus {
                phase: Some(PodPhase::Running),
                subnet_ip: Some("10.1.0.1".into()),
                ..Default::default()
            },
        };
        let not_running = Pod {
            meta: ObjectMeta::new("p2", Some("default".into())).with_labels(labels(&[("app", "web")])),
            spec: PodSpec::default(),
            status: PodStatus {
                phase: Some(PodPhase::Creating),
                subnet_ip: Some("10.1.0.2".into()),
                ..Default::default()
            },
        };
        let no_match = Pod {
            meta: ObjectMeta::new("p3", Some("default".into())).with_labels(labels(&[("app", "db")])),
            spec: PodSpec::default(),
            status: PodStatus {
                phase: Some(PodPhase::Running),
                subnet_ip: Some("10.1.0.3".into()),
                ..Default::default()
            },
        };
        let pods = vec![running_match, not_running, no_match];
        let service = Service::new(
            ObjectMeta::new("svc1", Some("default".into())),
            flotilla_model::ServiceSpec {
                type_: ServiceType::ClusterIp,
                selector,
                port: flotilla_model::ServicePort {
                    port: 80,
                    target_port: 8080,
                    protocol: Default::default(),
                    node_port: None,
                },
            },
        );
        let endpoints = compute_endpoints(&service, &pods);
        assert_eq!(endpoints.into_iter().map(|e| e.ip).collect::<Vec<_>>(), vec!["10.1.0.1".to_string()]);
    }
}
