//! Function CRUD and invocation (spec.md §4.1, §5). Create takes a multipart
//! upload so the archive bytes never touch disk as a separate object — the
//! image builder consumes them directly — and invoke implements the
//! read-mostly/write-rare lock discipline spec.md §5 describes for the
//! Function table.

use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_faas::{build_pod_for_function, forward_request, pick_pod};
use flotilla_model::{Function, FunctionSpec, Kind, ObjectKey, Pod};
use tokio::time::sleep;

use crate::crud;
use crate::error::{ApiError, Result};
use crate::routes::pods::submit_to_scheduler;
use crate::state::AppState;

/// How long an invocation waits for a cold-started Pod to reach `Running`
/// with an overlay IP before giving up (spec.md §4.1 "waits a grace period").
const COLD_START_TIMEOUT: Duration = Duration::from_secs(10);
const COLD_START_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Function>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::Function).await?))
}

pub async fn list_namespaced(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Function>>> {
    Ok(Json(crud::list_namespaced(state.kv.as_ref(), Kind::Function, &namespace).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Function>> {
    let key = ObjectKey::namespaced(Kind::Function, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

/// Reads a `name`, a `trigger`, and an `archive` part from the multipart body,
/// builds and pushes the image synchronously, then persists the Function with
/// `status.image` already set (spec.md §4.1: Function create "builds the
/// image before returning").
pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Function>> {
    let mut name: Option<String> = None;
    let mut trigger: Option<String> = None;
    let mut archive: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("name") => {
                name = Some(field.text().await.map_err(|e| ApiError::Validation(e.to_string()))?)
            }
            Some("trigger") => {
                trigger = Some(field.text().await.map_err(|e| ApiError::Validation(e.to_string()))?)
            }
            Some("archive") => {
                archive = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?
                        .to_vec(),
                )
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ApiError::Validation("missing 'name' field".to_string()))?;
    let trigger = trigger.ok_or_else(|| ApiError::Validation("missing 'trigger' field".to_string()))?;
    let archive = archive.ok_or_else(|| ApiError::Validation("missing 'archive' field".to_string()))?;

    let key = ObjectKey::namespaced(Kind::Function, &namespace, &name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }

    let image = state
        .image_builder
        .build_and_push(&name, &archive)
        .await
        .map_err(ApiError::Validation)?;

    let mut function = Function::new(
        flotilla_model::ObjectMeta::new(&name, Some(namespace)),
        FunctionSpec {
            trigger,
            source_archive_ref: format!("upload:{name}"),
        },
    );
    function.status.image = Some(image);

    crud::put(state.kv.as_ref(), &key, &function).await?;
    Ok(Json(function))
}

/// Only `trigger` is mutable; rebuilding the image requires a new `create`.
pub async fn update(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(incoming): Json<Function>,
) -> Result<Json<Function>> {
    let key = ObjectKey::namespaced(Kind::Function, &namespace, &name);
    let mut stored: Function = crud::require(state.kv.as_ref(), &key).await?;
    stored.spec.trigger = incoming.spec.trigger;
    crud::put(state.kv.as_ref(), &key, &stored).await?;
    Ok(Json(stored))
}

/// Exclusive lock (spec.md §5): deletes every backing Pod, then the record.
pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::Function, &namespace, &name);
    let _write_guard = state.function_lock.write().await;
    let function: Function = crud::require(state.kv.as_ref(), &key).await?;

    for pod_name in &function.status.pod_names {
        let pod_key = ObjectKey::namespaced(Kind::Pod, &namespace, pod_name);
        if let Some(pod) = crud::get_typed::<Pod>(state.kv.as_ref(), &pod_key).await? {
            if let Some(node_name) = pod.status.node_name {
                let node_key = ObjectKey::cluster_scoped(Kind::Node, &node_name);
                if let Some(node) = crud::get_typed::<flotilla_model::Node>(state.kv.as_ref(), &node_key).await? {
                    flotilla_store::TypedBus::new(state.bus.as_ref())
                        .publish(
                            &node.pod_topic,
                            &crate::wire::PodCommand::Delete { namespace: namespace.clone(), name: pod_name.clone() },
                        )
                        .await?;
                }
            }
        }
        crud::delete(state.kv.as_ref(), &pod_key).await?;
    }

    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Starts the function's first backing Pod through the normal scheduling path
/// (create + publish to the scheduler topic) and waits for it to become
/// reachable. Caller must hold `function_lock` for writing.
async fn cold_start(state: &AppState, namespace: &str, function: &mut Function) -> Result<()> {
    let pod_name = format!("{}-{}", function.meta.name, function.status.pod_names.len());
    let pod = build_pod_for_function(function, namespace, &pod_name).map_err(ApiError::Internal)?;
    let pod_key = ObjectKey::namespaced(Kind::Pod, namespace, &pod_name);
    crud::put(state.kv.as_ref(), &pod_key, &pod).await?;
    submit_to_scheduler(state.bus.as_ref(), &pod).await?;

    function.status.pod_names.push(pod_name.clone());
    let function_key = ObjectKey::namespaced(Kind::Function, namespace, &function.meta.name);
    crud::put(state.kv.as_ref(), &function_key, function).await?;

    let deadline = tokio::time::Instant::now() + COLD_START_TIMEOUT;
    loop {
        let pod: Option<Pod> = crud::get_typed(state.kv.as_ref(), &pod_key).await?;
        if let Some(pod) = pod {
            if matches!(pod.status.phase, Some(flotilla_model::PodPhase::Running)) && pod.status.subnet_ip.is_some()
            {
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ApiError::Internal(format!(
                "function '{}' cold start timed out waiting for pod '{pod_name}'",
                function.meta.name
            )));
        }
        sleep(COLD_START_POLL_INTERVAL).await;
    }
}

/// Invokes the function, cold-starting its first Pod if none is running yet
/// (spec.md §5's lock-upgrade dance: read lock for the common path, release
/// and reacquire for write only when a cold start is needed, with a
/// double-check after reacquiring in case another invocation already started
/// one).
pub async fn invoke(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> Result<Vec<u8>> {
    let key = ObjectKey::namespaced(Kind::Function, &namespace, &name);

    {
        let _read_guard = state.function_lock.read().await;
        let function: Function = crud::require(state.kv.as_ref(), &key).await?;
        let pods: Vec<Pod> = crud::list_namespaced::<Pod>(state.kv.as_ref(), Kind::Pod, &namespace)
            .await?
            .into_iter()
            .filter(|p| function.status.pod_names.contains(&p.meta.name))
            .collect();
        if let Some(pod) = pick_pod(&pods) {
            bump_request_counter(&state, &key).await?;
            return forward_request(&state.http, pod, &function.spec.trigger, body.to_vec())
                .await
                .map_err(ApiError::Internal);
        }
    }

    let mut function: Function = {
        let _write_guard = state.function_lock.write().await;
        let function: Function = crud::require(state.kv.as_ref(), &key).await?;
        let pods: Vec<Pod> = crud::list_namespaced::<Pod>(state.kv.as_ref(), Kind::Pod, &namespace)
            .await?
            .into_iter()
            .filter(|p| function.status.pod_names.contains(&p.meta.name))
            .collect();
        if pick_pod(&pods).is_some() {
            function
        } else {
            let mut function = function;
            cold_start(&state, &namespace, &mut function).await?;
            function
        }
    };

    let _read_guard = state.function_lock.read().await;
    function = crud::require(state.kv.as_ref(), &key).await?;
    let pods: Vec<Pod> = crud::list_namespaced::<Pod>(state.kv.as_ref(), Kind::Pod, &namespace)
        .await?
        .into_iter()
        .filter(|p| function.status.pod_names.contains(&p.meta.name))
        .collect();
    let pod = pick_pod(&pods).ok_or_else(|| {
        ApiError::Internal(format!("function '{name}' has no reachable pod after cold start"))
    })?;
    bump_request_counter(&state, &key).await?;
    forward_request(&state.http, pod, &function.spec.trigger, body.to_vec())
        .await
        .map_err(ApiError::Internal)
}

async fn bump_request_counter(state: &AppState, key: &ObjectKey) -> Result<()> {
    let mut function: Function = crud::require(state.kv.as_ref(), key).await?;
    function.status.requests_since_tick += 1;
    crud::put(state.kv.as_ref(), key, &function).await
}
