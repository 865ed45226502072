use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flotilla_model::{Dns, Kind, ObjectKey};

use crate::crud;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Dns>>> {
    Ok(Json(crud::list_all(state.kv.as_ref(), Kind::Dns).await?))
}

pub async fn list_namespaced(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Dns>>> {
    Ok(Json(crud::list_namespaced(state.kv.as_ref(), Kind::Dns, &namespace).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Dns>> {
    let key = ObjectKey::namespaced(Kind::Dns, namespace, name);
    Ok(Json(crud::require(state.kv.as_ref(), &key).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut dns): Json<Dns>,
) -> Result<Json<Dns>> {
    dns.meta.namespace = Some(namespace.clone());
    let key = ObjectKey::namespaced(Kind::Dns, &namespace, &dns.meta.name);
    if crud::exists(state.kv.as_ref(), &key).await? {
        return Err(ApiError::Conflict(key.to_string()));
    }
    crud::put(state.kv.as_ref(), &key, &dns).await?;
    Ok(Json(dns))
}

pub async fn update(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(dns): Json<Dns>,
) -> Result<Json<Dns>> {
    let key = ObjectKey::namespaced(Kind::Dns, &namespace, &name);
    crud::require::<Dns>(state.kv.as_ref(), &key).await?;
    crud::put(state.kv.as_ref(), &key, &dns).await?;
    Ok(Json(dns))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    let key = ObjectKey::namespaced(Kind::Dns, namespace, name);
    crud::require::<Dns>(state.kv.as_ref(), &key).await?;
    crud::delete(state.kv.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
