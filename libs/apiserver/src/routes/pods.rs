use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_model::{Kind, ObjectKey, Pod, PodStatus};
use flotilla_store::TypedBus;
use serde::Deserialize;

use crate::crud;
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::wire::PodCommand;

/// Single global topic every pending Pod is published to for the scheduler to
/// consume (spec.md §6: `scheduler` — Pod records to be scheduled).
pub const SCHEDULER_TOPIC: &str = "scheduler";
/// A single consumer group of one, per spec.md §5: "ensures each pending Pod is
/// scheduled exactly once per successful bind."
pub const SCHEDULER_GROUP: &str = "scheduler";

pub async fn list_pods(State(state): State<AppState>) -> Result<Json<Vec<Pod>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::Pod).await?))
}

pub async fn list_namespace_pods(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Pod>>> {
    Ok(Json(crud::list_namespaced(state.kv.as_ref(), Kind::Pod, &namespace).await?))
}

pub async fn get_pod(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Pod>> {
    let key = ObjectKey::namespaced(Kind::Pod, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

/// Publishes `pod` onto the scheduler topic, per spec.md §4.1's Create contract
/// ("emits a scheduling request onto the scheduler topic") and the standalone
/// `POST /scheduler` route (spec.md §6), which this also backs for manual
/// resubmission of a stuck Pod.
pub async fn submit_to_scheduler(bus: &dyn flotilla_store::MessageBus, pod: &Pod) -> Result<()> {
    TypedBus::new(bus).publish(SCHEDULER_TOPIC, pod).await?;
    Ok(())
}

/// Rejects a Pod where a container mounts a volume name absent from
/// `spec.volumes` (spec.md §7: "unknown volume reference -> Validation 400").
fn validate_volume_mounts(pod: &Pod) -> Result<()> {
    let declared: std::collections::HashSet<&str> = pod.spec.volumes.iter().map(|v| v.name.as_str()).collect();
    for container in &pod.spec.containers {
        for mount in &container.volume_mounts {
            if !declared.contains(mount.name.as_str()) {
                return Err(ApiError::Validation(format!(
                    "container {} mounts undeclared volume {}",
                    container.name, mount.name
                )));
            }
        }
    }
    Ok(())
}

pub async fn create_pod(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut pod): Json<Pod>,
) -> Result<Json<Pod>> {
    pod.meta.namespace = Some(namespace.clone());
    validate_volume_mounts(&pod)?;
    let key = ObjectKey::namespaced(Kind::Pod, &namespace, &pod.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }
    pod.status = PodStatus { phase: Some(flotilla_model::PodPhase::Creating), ..Default::default() };
    crud::put(state.kv.as_ref(), &key, &pod).await?;
    submit_to_scheduler(state.bus.as_ref(), &pod).await?;
    tracing::info!(pod = %key, "pod created, submitted to scheduler");
    Ok(Json(pod))
}

pub async fn post_scheduler(
    State(state): State<AppState>,
    Json(pod): Json<Pod>,
) -> Result<Json<flotilla_api_client::SchedulerHandoff>> {
    submit_to_scheduler(state.bus.as_ref(), &pod).await?;
    Ok(Json(flotilla_api_client::SchedulerHandoff {
        topic: SCHEDULER_TOPIC.to_string(),
        group: SCHEDULER_GROUP.to_string(),
    }))
}

/// Bind a scheduled Pod to a Node (spec.md §4.1's internal "Bind Pod -> Node"
/// contract, called by the scheduler via `PUT
/// /scheduler/namespaces/{ns}/pods/{name}/nodes/{node}`): writes `nodeName` on
/// the record, then enqueues `ADD` on the node's pod topic (§5: "the API
/// enqueues ADD strictly after the KV update persists").
pub async fn bind_pod(
    State(state): State<AppState>,
    Path((namespace, name, node_name)): Path<(String, String, String)>,
) -> Result<Json<Pod>> {
    let key = ObjectKey::namespaced(Kind::Pod, &namespace, &name);
    let mut pod: Pod = crud::require(state.kv.as_ref(), &key).await?;
    pod.status.node_name = Some(node_name.clone());
    crud::put(state.kv.as_ref(), &key, &pod).await?;

    let node_key = ObjectKey::cluster_scoped(Kind::Node, &node_name);
    let node: flotilla_model::Node = crud::require(state.kv.as_ref(), &node_key).await?;
    TypedBus::new(state.bus.as_ref())
        .publish(&node.pod_topic, &PodCommand::Add { pod: pod.clone() })
        .await?;
    Ok(Json(pod))
}

/// Applies only mutable fields (labels); spec (container list, volumes, ...) is
/// immutable post-creation, per spec.md §4.1/§4.3. Still forwards the full
/// submitted object as an `UPDATE` command — the node agent is the one that
/// actually rejects spec changes (spec.md §4.3).
pub async fn update_pod(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(incoming): Json<Pod>,
) -> Result<Json<Pod>> {
    let key = ObjectKey::namespaced(Kind::Pod, &namespace, &name);
    let mut stored: Pod = crud::require(state.kv.as_ref(), &key).await?;
    stored.meta.labels = incoming.meta.labels.clone();
    crud::put(state.kv.as_ref(), &key, &stored).await?;

    if let Some(node_name) = stored.status.node_name.clone() {
        let node_key = ObjectKey::cluster_scoped(Kind::Node, &node_name);
        if let Some(node) = crud::get_typed::<flotilla_model::Node>(state.kv.as_ref(), &node_key).await? {
            TypedBus::new(state.bus.as_ref())
                .publish(&node.pod_topic, &PodCommand::Update { pod: incoming })
                .await?;
        }
    }
    Ok(Json(stored))
}

/// Idempotent: deleting an unknown Pod yields [`ApiError::NotFound`] (a plain
/// 404), never a 5xx (spec.md §4.1).
pub async fn delete_pod(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::Pod, &namespace, &name);
    let pod: Pod = crud::require(state.kv.as_ref(), &key).await?;

    if let Some(node_name) = pod.status.node_name {
        let node_key = ObjectKey::cluster_scoped(Kind::Node, &node_name);
        if let Some(node) = crud::get_typed::<flotilla_model::Node>(state.kv.as_ref(), &node_key).await? {
            TypedBus::new(state.bus.as_ref())
                .publish(&node.pod_topic, &PodCommand::Delete { namespace: namespace.clone(), name: name.clone() })
                .await?;
        }
    }
    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_pod_status(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<PodStatus>> {
    let key = ObjectKey::namespaced(Kind::Pod, namespace, name);
    let pod: Pod = crud::require(state.kv.as_ref(), &key).await?;
    Ok(Json(pod.status))
}

/// Authoritative state transitions reported by the node agent (spec.md §4.1:
/// "writes through").
pub async fn put_pod_status(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(status): Json<PodStatus>,
) -> Result<Json<PodStatus>> {
    let key = ObjectKey::namespaced(Kind::Pod, namespace, name);
    let mut pod: Pod = crud::require(state.kv.as_ref(), &key).await?;
    pod.status = status.clone();
    crud::put(state.kv.as_ref(), &key, &pod).await?;
    Ok(Json(status))
}

#[derive(Deserialize)]
pub struct IpPayload {
    pub ip: String,
}

pub async fn get_pod_ip(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let key = ObjectKey::namespaced(Kind::Pod, namespace, name);
    let pod: Pod = crud::require(state.kv.as_ref(), &key).await?;
    Ok(Json(serde_json::json!({ "ip": pod.status.subnet_ip })))
}

/// Writes through the overlay IP the node agent assigned on `ADD` (spec.md
/// §4.3). `flotilla_api_client::FlotillaClient::update_pod_ip` issues this as a
/// `PATCH`, so the route is mounted on `PATCH` here rather than the `PUT`
/// spec.md's route table names (recorded in DESIGN.md).
pub async fn patch_pod_ip(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(payload): Json<IpPayload>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::Pod, namespace, name);
    let mut pod: Pod = crud::require(state.kv.as_ref(), &key).await?;
    pod.status.subnet_ip = Some(payload.ip);
    crud::put(state.kv.as_ref(), &key, &pod).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use flotilla_model::{ContainerSpec, ObjectMeta, PodSpec, VolumeMount, VolumeRef};

    use super::*;

    fn container(name: &str, mounts: Vec<VolumeMount>) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "busybox".to_string(),
            command: Vec::new(),
            args: Vec::new(),
            ports: Vec::new(),
            resources: Default::default(),
            volume_mounts: mounts,
            security_context: None,
        }
    }

    fn pod_with(spec: PodSpec) -> Pod {
        Pod::new(ObjectMeta::new("p1", Some("default".into())), spec)
    }

    #[test]
    fn mount_naming_a_declared_volume_passes() {
        let spec = PodSpec {
            containers: vec![container(
                "c1",
                vec![VolumeMount { name: "data".into(), mount_path: "/data".into(), read_only: false }],
            )],
            volumes: vec![VolumeRef { name: "data".into(), claim_name: "data-claim".into() }],
            ..Default::default()
        };
        assert!(validate_volume_mounts(&pod_with(spec)).is_ok());
    }

    #[test]
    fn mount_naming_an_undeclared_volume_is_rejected() {
        let spec = PodSpec {
            containers: vec![container(
                "c1",
                vec![VolumeMount { name: "data".into(), mount_path: "/data".into(), read_only: false }],
            )],
            volumes: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(validate_volume_mounts(&pod_with(spec)), Err(ApiError::Validation(_))));
    }
}
