use async_trait::async_trait;

use crate::error::Result;

/// A single delivery from a topic, carrying the opaque bytes the publisher sent
/// and an ack handle the consumer must call once it has durably acted on the
/// message (spec.md §5: at-least-once delivery, topic-partitioned by node/kind).
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: String,
    pub payload: Vec<u8>,
}

/// A message bus topic/consumer-group pair. At-least-once: a message not acked
/// before the consumer drops it (or crashes) is redelivered to the group.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Pulls up to `max` pending deliveries for `group` on `topic`, creating the
    /// group at the tail of the topic if it does not exist yet.
    async fn poll(&self, topic: &str, group: &str, max: usize) -> Result<Vec<Delivery>>;

    async fn ack(&self, topic: &str, group: &str, id: &str) -> Result<()>;
}

/// Typed convenience wrapper mirroring [`crate::kv::TypedKv`] for bus payloads.
pub struct TypedBus<'a> {
    inner: &'a dyn MessageBus,
}

impl<'a> TypedBus<'a> {
    pub fn new(inner: &'a dyn MessageBus) -> Self {
        Self { inner }
    }

    pub async fn publish<T: serde::Serialize + Sync>(&self, topic: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| crate::error::StoreError::Serialization(topic.to_string(), e))?;
        self.inner.publish(topic, bytes).await
    }

    pub async fn poll<T: serde::de::DeserializeOwned>(
        &self,
        topic: &str,
        group: &str,
        max: usize,
    ) -> Result<Vec<(String, T)>> {
        let deliveries = self.inner.poll(topic, group, max).await?;
        deliveries
            .into_iter()
            .map(|d| {
                let value = serde_json::from_slice(&d.payload)
                    .map_err(|e| crate::error::StoreError::Serialization(topic.to_string(), e))?;
                Ok((d.id, value))
            })
            .collect()
    }

    pub async fn ack(&self, topic: &str, group: &str, id: &str) -> Result<()> {
        self.inner.ack(topic, group, id).await
    }
}
