use async_trait::async_trait;

use crate::error::Result;

/// The hierarchical key/value store the control plane treats as its single source
/// of truth (spec.md §6). Keys are the `ObjectKey::kv_path()` strings produced by
/// `flotilla_model`; values are serialized object bodies. Object-safe so it can be
/// held as `Arc<dyn KvStore>` in server/controller state.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists every key under `prefix`, depth-unbounded, used to answer LIST routes
    /// and controller poll loops (spec.md §4).
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Typed convenience wrapper over a [`KvStore`], serializing/deserializing JSON
/// bodies so callers never handle raw bytes directly.
pub struct TypedKv<'a> {
    inner: &'a dyn KvStore,
}

impl<'a> TypedKv<'a> {
    pub fn new(inner: &'a dyn KvStore) -> Self {
        Self { inner }
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get(key).await? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| crate::error::StoreError::Serialization(key.to_string(), e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: serde::Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| crate::error::StoreError::Serialization(key.to_string(), e))?;
        self.inner.set(key, bytes).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    pub async fn list_prefix<T: serde::de::DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, T)>> {
        let raw = self.inner.list_prefix(prefix).await?;
        raw.into_iter()
            .map(|(k, bytes)| {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| crate::error::StoreError::Serialization(k.clone(), e))?;
                Ok((k, value))
            })
            .collect()
    }
}
