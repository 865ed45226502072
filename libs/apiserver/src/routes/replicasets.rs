use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_model::{Kind, ObjectKey, Pod, ReplicaSet};
use flotilla_store::TypedBus;

use crate::crud;
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::wire::PodCommand;

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<ReplicaSet>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::ReplicaSet).await?))
}

pub async fn list_namespaced(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<ReplicaSet>>> {
    Ok(Json(crud::list_namespaced(state.kv.as_ref(), Kind::ReplicaSet, &namespace).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ReplicaSet>> {
    let key = ObjectKey::namespaced(Kind::ReplicaSet, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

/// On creation, scans existing Pods in the namespace and records those already
/// matching the selector as owned (spec.md §4.1: "initial observed count
/// derives from that sweep").
pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut rs): Json<ReplicaSet>,
) -> Result<Json<ReplicaSet>> {
    rs.meta.namespace = Some(namespace.clone());
    let key = ObjectKey::namespaced(Kind::ReplicaSet, &namespace, &rs.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }

    let pods: Vec<Pod> = crud::list_namespaced(state.kv.as_ref(), Kind::Pod, &namespace).await?;
    let owned: Vec<String> = pods
        .into_iter()
        .filter(|p| p.meta.labels_match(&rs.spec.selector))
        .map(|p| p.meta.name)
        .collect();
    rs.status.observed_replicas = owned.len() as u32;
    rs.status.owned_pods = owned;

    crud::put(state.kv.as_ref(), &key, &rs).await?;
    Ok(Json(rs))
}

pub async fn update(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(rs): Json<ReplicaSet>,
) -> Result<Json<ReplicaSet>> {
    let key = ObjectKey::namespaced(Kind::ReplicaSet, &namespace, &name);
    crud::require::<ReplicaSet>(state.kv.as_ref(), &key).await?;
    crud::put(state.kv.as_ref(), &key, &rs).await?;
    Ok(Json(rs))
}

/// Cascades delete to owned Pods and any HPA targeting this ReplicaSet
/// (spec.md §4.5 ReplicaSetController). Implemented here, synchronously,
/// rather than in the controller's poll loop: a deleted object never appears
/// in a future `list_targets()` pass, so the controller has no chance to see
/// the deletion and cascade it (recorded in DESIGN.md).
pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::ReplicaSet, &namespace, &name);
    let rs: ReplicaSet = crud::require(state.kv.as_ref(), &key).await?;

    for pod_name in &rs.status.owned_pods {
        let pod_key = ObjectKey::namespaced(Kind::Pod, &namespace, pod_name);
        if let Some(pod) = crud::get_typed::<Pod>(state.kv.as_ref(), &pod_key).await? {
            if let Some(node_name) = pod.status.node_name {
                let node_key = ObjectKey::cluster_scoped(Kind::Node, &node_name);
                if let Some(node) = crud::get_typed::<flotilla_model::Node>(state.kv.as_ref(), &node_key).await? {
                    TypedBus::new(state.bus.as_ref())
                        .publish(&node.pod_topic, &PodCommand::Delete { namespace: namespace.clone(), name: pod_name.clone() })
                        .await?;
                }
            }
            crud::delete(state.kv.as_ref(), &pod_key).await?;
        }
    }

    let hpas: Vec<flotilla_model::HorizontalPodAutoscaler> =
        crud::list_namespaced(state.kv.as_ref(), Kind::HorizontalPodAutoscaler, &namespace).await?;
    for hpa in hpas {
        if hpa.spec.target.kind == "ReplicaSet" && hpa.spec.target.name == name {
            let hpa_key = ObjectKey::namespaced(Kind::HorizontalPodAutoscaler, &namespace, &hpa.meta.name);
            crud::delete(state.kv.as_ref(), &hpa_key).await?;
        }
    }

    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
