use axum::extract::{Path, State};
use axum::Json;
use flotilla_model::{Kind, Node, ObjectKey};

use crate::crud;
use crate::error::Result;
use crate::state::AppState;

pub async fn list_nodes(State(state): State<AppState>) -> Result<Json<Vec<Node>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::Node).await?))
}

/// Registers a node on first contact or refreshes its heartbeat on later calls
/// (spec.md §6: one route serves both). On first contact, derives and persists
/// the per-node pod/service topic names (spec.md §4.1 "creates the per-node Pod
/// topic and per-node service-proxy topic").
pub async fn register_or_heartbeat(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut node): Json<Node>,
) -> Result<Json<Node>> {
    node.meta.name = name.clone();
    let key = ObjectKey::cluster_scoped(Kind::Node, &name);

    if let Some(existing) = crud::get_typed::<Node>(state.kv.as_ref(), &key).await? {
        node.pod_topic = existing.pod_topic;
        node.service_topic = existing.service_topic;
        node.last_heartbeat = chrono::Utc::now();
        node.status = flotilla_model::NodeStatus::Online;
    } else {
        let fresh = Node::new(name, node.advertised_address.clone(), node.meta.labels.clone());
        node.pod_topic = fresh.pod_topic;
        node.service_topic = fresh.service_topic;
        node.meta.uid = fresh.meta.uid;
        node.meta.creation_timestamp = fresh.meta.creation_timestamp;
        node.last_heartbeat = fresh.last_heartbeat;
        node.status = fresh.status;
        tracing::info!(node = %node.meta.name, "node registered");
    }

    crud::put(state.kv.as_ref(), &key, &node).await?;
    Ok(Json(node))
}

pub async fn node_pods(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<flotilla_model::Pod>>> {
    let pods: Vec<flotilla_model::Pod> = crud::list_all(state.kv.as_ref(), Kind::Pod).await?;
    Ok(Json(pods.into_iter().filter(|p| p.status.node_name.as_deref() == Some(&name)).collect()))
}
