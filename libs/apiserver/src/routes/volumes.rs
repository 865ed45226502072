//! Plain CRUD for PersistentVolume (cluster-scoped) and PersistentVolumeClaim
//! (namespaced). All binding and provisioning logic lives in the PVController
//! (`flotilla-pv-controller`), not here — the apiserver only persists records
//! and lets that controller's poll loop observe and act on them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_model::{Kind, ObjectKey, PersistentVolume, PersistentVolumeClaim};

use crate::crud;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn list_volumes(State(state): State<AppState>) -> Result<Json<Vec<PersistentVolume>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::PersistentVolume).await?))
}

pub async fn get_volume(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PersistentVolume>> {
    let key = ObjectKey::cluster_scoped(Kind::PersistentVolume, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

pub async fn create_volume(
    State(state): State<AppState>,
    Json(pv): Json<PersistentVolume>,
) -> Result<Json<PersistentVolume>> {
    let key = ObjectKey::cluster_scoped(Kind::PersistentVolume, &pv.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }
    crud::put(state.kv.as_ref(), &key, &pv).await?;
    Ok(Json(pv))
}

pub async fn update_volume(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(pv): Json<PersistentVolume>,
) -> Result<Json<PersistentVolume>> {
    let key = ObjectKey::cluster_scoped(Kind::PersistentVolume, &name);
    crud::require::<PersistentVolume>(state.kv.as_ref(), &key).await?;
    crud::put(state.kv.as_ref(), &key, &pv).await?;
    Ok(Json(pv))
}

pub async fn delete_volume(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    let key = ObjectKey::cluster_scoped(Kind::PersistentVolume, name);
    crud::require::<PersistentVolume>(state.kv.as_ref(), &key).await?;
    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_claims_all(State(state): State<AppState>) -> Result<Json<Vec<PersistentVolumeClaim>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::PersistentVolumeClaim).await?))
}

pub async fn list_claims_namespaced(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<PersistentVolumeClaim>>> {
    Ok(Json(
        crud::list_namespaced(state.kv.as_ref(), Kind::PersistentVolumeClaim, &namespace).await?,
    ))
}

pub async fn get_claim(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<PersistentVolumeClaim>> {
    let key = ObjectKey::namespaced(Kind::PersistentVolumeClaim, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

pub async fn create_claim(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut pvc): Json<PersistentVolumeClaim>,
) -> Result<Json<PersistentVolumeClaim>> {
    pvc.meta.namespace = Some(namespace.clone());
    let key = ObjectKey::namespaced(Kind::PersistentVolumeClaim, &namespace, &pvc.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }
    crud::put(state.kv.as_ref(), &key, &pvc).await?;
    Ok(Json(pvc))
}

pub async fn update_claim(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(pvc): Json<PersistentVolumeClaim>,
) -> Result<Json<PersistentVolumeClaim>> {
    let key = ObjectKey::namespaced(Kind::PersistentVolumeClaim, &namespace, &name);
    crud::require::<PersistentVolumeClaim>(state.kv.as_ref(), &key).await?;
    crud::put(state.kv.as_ref(), &key, &pvc).await?;
    Ok(Json(pvc))
}

pub async fn delete_claim(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::PersistentVolumeClaim, namespace, name);
    crud::require::<PersistentVolumeClaim>(state.kv.as_ref(), &key).await?;
    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
