//! Workflow CRUD and synchronous invocation (spec.md §4.5, §6). Invocation
//! reimplements `flotilla_faas::workflow::execute`'s traversal directly
//! against the API server's own store rather than going through
//! `FlotillaClient`, since the apiserver already holds the data that client
//! would fetch over HTTP — looping back through itself would just add a
//! redundant network hop.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_faas::{forward_request, pick_pod};
use flotilla_model::{Function, Kind, ObjectKey, Pod, Workflow};
use serde_json::Value;

use crate::crud;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Workflow>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::Workflow).await?))
}

pub async fn list_namespaced(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Workflow>>> {
    Ok(Json(crud::list_namespaced(state.kv.as_ref(), Kind::Workflow, &namespace).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Workflow>> {
    let key = ObjectKey::namespaced(Kind::Workflow, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut workflow): Json<Workflow>,
) -> Result<Json<Workflow>> {
    workflow.meta.namespace = Some(namespace.clone());
    workflow.spec.topo_order()?;
    let key = ObjectKey::namespaced(Kind::Workflow, &namespace, &workflow.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }
    crud::put(state.kv.as_ref(), &key, &workflow).await?;
    Ok(Json(workflow))
}

pub async fn update(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(workflow): Json<Workflow>,
) -> Result<Json<Workflow>> {
    workflow.spec.topo_order()?;
    let key = ObjectKey::namespaced(Kind::Workflow, &namespace, &name);
    crud::require::<Workflow>(state.kv.as_ref(), &key).await?;
    crud::put(state.kv.as_ref(), &key, &workflow).await?;
    Ok(Json(workflow))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::Workflow, namespace, name);
    crud::require::<Workflow>(state.kv.as_ref(), &key).await?;
    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Traverses the step graph in topological order, forwarding the original
/// payload to each step's Function and collecting `{step_name: response}`
/// (spec.md §4.5's synchronous executor). A step with no running backing Pod
/// fails the whole invocation rather than cold-starting one — Workflow steps
/// are expected to target already-warm Functions (recorded in DESIGN.md).
pub async fn invoke(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> Result<Json<Value>> {
    let key = ObjectKey::namespaced(Kind::Workflow, &namespace, &name);
    let workflow: Workflow = crud::require(state.kv.as_ref(), &key).await?;
    let order = workflow.spec.topo_order()?;

    let mut results = serde_json::Map::new();
    for step_name in order {
        let step = workflow
            .spec
            .steps
            .iter()
            .find(|s| s.name == step_name)
            .expect("topo_order only returns known step names");

        let function_key = ObjectKey::namespaced(Kind::Function, &namespace, &step.function);
        let function: Function = crud::get_typed(state.kv.as_ref(), &function_key)
            .await?
            .ok_or_else(|| {
                ApiError::Validation(format!(
                    "workflow step '{step_name}' references unknown function '{}'",
                    step.function
                ))
            })?;

        let pods: Vec<Pod> = crud::list_namespaced::<Pod>(state.kv.as_ref(), Kind::Pod, &namespace)
            .await?
            .into_iter()
            .filter(|p| function.status.pod_names.contains(&p.meta.name))
            .collect();
        let pod = pick_pod(&pods).ok_or_else(|| {
            ApiError::Validation(format!("workflow step '{step_name}' has no running backing pod"))
        })?;

        let response = forward_request(&state.http, pod, &function.spec.trigger, body.to_vec())
            .await
            .map_err(ApiError::Internal)?;
        results.insert(step_name, Value::String(String::from_utf8_lossy(&response).into_owned()));
    }

    Ok(Json(Value::Object(results)))
}
