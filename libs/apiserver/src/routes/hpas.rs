use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_model::{HorizontalPodAutoscaler, Kind, ObjectKey};

use crate::crud;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<HorizontalPodAutoscaler>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::HorizontalPodAutoscaler).await?))
}

pub async fn list_namespaced(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<HorizontalPodAutoscaler>>> {
    Ok(Json(crud::list_namespaced(state.kv.as_ref(), Kind::HorizontalPodAutoscaler, &namespace).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<HorizontalPodAutoscaler>> {
    let key = ObjectKey::namespaced(Kind::HorizontalPodAutoscaler, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

/// Validates the target ReplicaSet exists, then flips its `hpa_controlled`
/// flag (spec.md §4.1 HPA create contract).
pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut hpa): Json<HorizontalPodAutoscaler>,
) -> Result<Json<HorizontalPodAutoscaler>> {
    hpa.meta.namespace = Some(namespace.clone());
    let key = ObjectKey::namespaced(Kind::HorizontalPodAutoscaler, &namespace, &hpa.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }
    if hpa.spec.target.kind != "ReplicaSet" {
        return Err(ApiError::Validation(format!(
            "unsupported HPA target kind '{}'",
            hpa.spec.target.kind
        )));
    }

    let rs_key = ObjectKey::namespaced(Kind::ReplicaSet, &namespace, &hpa.spec.target.name);
    let mut rs: flotilla_model::ReplicaSet = crud::require(state.kv.as_ref(), &rs_key)
        .await
        .map_err(|_| ApiError::Validation(format!("target ReplicaSet '{}' does not exist", hpa.spec.target.name)))?;
    rs.status.hpa_controlled = true;
    crud::put(state.kv.as_ref(), &rs_key, &rs).await?;

    crud::put(state.kv.as_ref(), &key, &hpa).await?;
    Ok(Json(hpa))
}

pub async fn update(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(hpa): Json<HorizontalPodAutoscaler>,
) -> Result<Json<HorizontalPodAutoscaler>> {
    let key = ObjectKey::namespaced(Kind::HorizontalPodAutoscaler, &namespace, &name);
    crud::require::<HorizontalPodAutoscaler>(state.kv.as_ref(), &key).await?;
    crud::put(state.kv.as_ref(), &key, &hpa).await?;
    Ok(Json(hpa))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::HorizontalPodAutoscaler, namespace, name);
    crud::require::<HorizontalPodAutoscaler>(state.kv.as_ref(), &key).await?;
    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
