use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_model::{Kind, ObjectKey, Service};
use flotilla_service_controller::{compute_endpoints, NodePortEvent, ProxyAction, ProxyEndpoint, ProxyMessage, NODE_PORT_TOPIC};
use flotilla_store::TypedBus;

use crate::crud;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Service>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::Service).await?))
}

pub async fn list_namespaced(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Service>>> {
    Ok(Json(crud::list_namespaced(state.kv.as_ref(), Kind::Service, &namespace).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Service>> {
    let key = ObjectKey::namespaced(Kind::Service, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut service): Json<Service>,
) -> Result<Json<Service>> {
    service.meta.namespace = Some(namespace.clone());
    let key = ObjectKey::namespaced(Kind::Service, &namespace, &service.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }
    crud::put(state.kv.as_ref(), &key, &service).await?;
    Ok(Json(service))
}

/// Enforces spec.md §4.1's narrow update contract: the submitted spec fields
/// other than `port.node_port` are immutable post-creation (same "the API
/// never mutates spec out from under the caller" rule as Pod update), and
/// `status.cluster_ip` may only move from unset to set, never change once
/// assigned — "only if currently unset ... atomic IP-assignment handoff from
/// ServiceController" (spec.md §4.1). `node_port` is excluded from that freeze
/// because the NodePort manager legitimately reassigns it (spec.md §4.5.5:
/// "service update auto-releases the old port before taking the new").
pub async fn update(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(incoming): Json<Service>,
) -> Result<Json<Service>> {
    let key = ObjectKey::namespaced(Kind::Service, &namespace, &name);
    let stored: Service = crud::require(state.kv.as_ref(), &key).await?;

    if let (Some(old_ip), Some(new_ip)) = (&stored.status.cluster_ip, &incoming.status.cluster_ip) {
        if old_ip != new_ip {
            return Err(ApiError::Conflict(format!(
                "clusterIP for {key} is already assigned and cannot be reassigned"
            )));
        }
    }

    let mut merged = stored;
    merged.status.cluster_ip = incoming.status.cluster_ip.or(merged.status.cluster_ip);
    merged.spec.port.node_port = incoming.spec.port.node_port;

    crud::put(state.kv.as_ref(), &key, &merged).await?;
    Ok(Json(merged))
}

/// Publishes `DELETE` to every node's service topic, then releases the
/// clusterIP (simply by dropping the record) and nodePort (spec.md §4.5
/// ServiceController: "On Service delete: publishes DELETE to every node,
/// releases clusterIP and nodePort").
pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::Service, &namespace, &name);
    let service: Service = crud::require(state.kv.as_ref(), &key).await?;

    let nodes: Vec<flotilla_model::Node> = crud::list_all(state.kv.as_ref(), Kind::Node).await?;
    let message = ProxyMessage {
        action: ProxyAction::Delete,
        service_name: name.clone(),
        cluster_ip: service.status.cluster_ip.clone().unwrap_or_default(),
        port: service.spec.port.port,
        protocol: service.spec.port.protocol,
        endpoints: Vec::<ProxyEndpoint>::new(),
        node_port: service.spec.port.node_port,
    };
    let typed_bus = TypedBus::new(state.bus.as_ref());
    for node in nodes {
        if let Err(err) = typed_bus.publish(&node.service_topic, &message).await {
            tracing::warn!(node = %node.meta.name, %err, "failed to publish service deletion");
        }
    }

    if service.spec.port.node_port.is_some() {
        let event = NodePortEvent::Deallocate { service: key.to_string() };
        if let Err(err) = typed_bus.publish(NODE_PORT_TOPIC, &event).await {
            tracing::warn!(%err, "failed to broadcast nodeport release");
        }
    }

    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Read-only introspection of the endpoint set the ServiceController has
/// computed and fanned out to proxies for `name` (spec.md §4.5 bullet 3),
/// reusing the controller's own selector/Running filter so this can never
/// drift from what nodes actually received.
pub async fn get_endpoints(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Vec<ProxyEndpoint>>> {
    let key = ObjectKey::namespaced(Kind::Service, &namespace, &name);
    let service: Service = crud::require(state.kv.as_ref(), &key).await?;
    let pods = crud::list_namespaced(state.kv.as_ref(), Kind::Pod, &namespace).await?;
    Ok(Json(compute_endpoints(&service, &pods)))
}
