use flotilla_model::{Kind, ObjectKey};
use flotilla_store::{KvStore, TypedKv};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, Result};

/// Generic KV read/write helpers shared by every route module, addressed by
/// [`ObjectKey`] the way spec.md §6's `/{kind}s/{namespace}/{name}` key layout
/// describes. Kept thin and untyped-by-kind so each route file only has to
/// spell out its entity's own side effects (spec.md §4.1's per-entity contracts),
/// not key bookkeeping.
pub async fn list_all<T: DeserializeOwned>(kv: &dyn KvStore, kind: Kind) -> Result<Vec<T>> {
    let prefix = format!("/{}/", kind.plural());
    let entries = TypedKv::new(kv).list_prefix::<T>(&prefix).await?;
    Ok(entries.into_iter().map(|(_, v)| v).collect())
}

pub async fn list_namespaced<T: DeserializeOwned>(
    kv: &dyn KvStore,
    kind: Kind,
    namespace: &str,
) -> Result<Vec<T>> {
    let prefix = format!("/{}/{namespace}/", kind.plural());
    let entries = TypedKv::new(kv).list_prefix::<T>(&prefix).await?;
    Ok(entries.into_iter().map(|(_, v)| v).collect())
}

pub async fn get(kv: &dyn KvStore, key: &ObjectKey) -> Result<Option<Vec<u8>>> {
    Ok(kv.get(&key.kv_path()).await?)
}

pub async fn get_typed<T: DeserializeOwned>(kv: &dyn KvStore, key: &ObjectKey) -> Result<Option<T>> {
    Ok(TypedKv::new(kv).get(&key.kv_path()).await?)
}

pub async fn require<T: DeserializeOwned>(kv: &dyn KvStore, key: &ObjectKey) -> Result<T> {
    get_typed(kv, key).await?.ok_or_else(|| ApiError::NotFound(key.to_string()))
}

pub async fn exists(kv: &dyn KvStore, key: &ObjectKey) -> Result<bool> {
    Ok(get(kv, key).await?.is_some())
}

pub async fn put<T: Serialize + Sync>(kv: &dyn KvStore, key: &ObjectKey, value: &T) -> Result<()> {
    TypedKv::new(kv).set(&key.kv_path(), value).await?;
    Ok(())
}

/// Deletes `key`, returning whether it previously existed — the building block
/// for spec.md §4.1's "deleting an unknown object returns not-found, never
/// errors the caller" idempotent-delete contract.
pub async fn delete(kv: &dyn KvStore, key: &ObjectKey) -> Result<bool> {
    let existed = exists(kv, key).await?;
    kv.delete(&key.kv_path()).await?;
    Ok(existed)
}
