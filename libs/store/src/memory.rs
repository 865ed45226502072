use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::bus::{Delivery, MessageBus};
use crate::error::Result;
use crate::kv::KvStore;

/// In-process KV store backed by a mutex-guarded map, used by unit/integration
/// tests and by `--backend memory` single-process demo runs.
#[derive(Default)]
pub struct InMemoryKvStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.lock().unwrap();
        let mut entries: Vec<_> = data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

struct Topic {
    next_id: u64,
    log: VecDeque<(u64, Vec<u8>)>,
    /// Per-group read cursor: the id of the next undelivered message.
    cursors: HashMap<String, u64>,
}

impl Default for Topic {
    fn default() -> Self {
        Self {
            next_id: 0,
            log: VecDeque::new(),
            cursors: HashMap::new(),
        }
    }
}

/// In-process message bus approximating Redis stream + consumer-group semantics:
/// each group has an independent cursor over the same append-only log, and a
/// message is only dropped from the log once every known group has passed it.
#[derive(Default)]
pub struct InMemoryMessageBus {
    topics: Mutex<HashMap<String, Topic>>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut topics = self.topics.lock().unwrap();
        let t = topics.entry(topic.to_string()).or_default();
        let id = t.next_id;
        t.next_id += 1;
        t.log.push_back((id, payload));
        Ok(())
    }

    async fn poll(&self, topic: &str, group: &str, max: usize) -> Result<Vec<Delivery>> {
        let mut topics = self.topics.lock().unwrap();
        let t = topics.entry(topic.to_string()).or_default();
        let cursor = *t.cursors.entry(group.to_string()).or_insert(0);

        let deliveries: Vec<Delivery> = t
            .log
            .iter()
            .filter(|(id, _)| *id >= cursor)
            .take(max)
            .map(|(id, payload)| Delivery {
                id: id.to_string(),
                payload: payload.clone(),
            })
            .collect();

        if let Some(last) = deliveries.last() {
            let next = last.id.parse::<u64>().unwrap() + 1;
            t.cursors.insert(group.to_string(), next);
        }
        Ok(deliveries)
    }

    async fn ack(&self, topic: &str, _group: &str, id: &str) -> Result<()> {
        let mut topics = self.topics.lock().unwrap();
        if let Some(t) = topics.get_mut(topic) {
            let id: u64 = id.parse().unwrap_or(u64::MAX);
            let lowest_cursor = t.cursors.values().copied().min().unwrap_or(0);
            if id < lowest_cursor {
                t.log.retain(|(logged_id, _)| *logged_id >= lowest_cursor);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kv_round_trips_values() {
        let store = InMemoryKvStore::new();
        store.set("/pods/default/web-0", b"body".to_vec()).await.unwrap();
        assert_eq!(
            store.get("/pods/default/web-0").await.unwrap(),
            Some(b"body".to_vec())
        );
        store.delete("/pods/default/web-0").await.unwrap();
        assert_eq!(store.get("/pods/default/web-0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn kv_lists_by_prefix_sorted() {
        let store = InMemoryKvStore::new();
        store.set("/pods/default/b", b"2".to_vec()).await.unwrap();
        store.set("/pods/default/a", b"1".to_vec()).await.unwrap();
        store.set("/nodes/n1", b"x".to_vec()).await.unwrap();

        let listed = store.list_prefix("/pods/default/").await.unwrap();
        assert_eq!(
            listed,
            vec![
                ("/pods/default/a".to_string(), b"1".to_vec()),
                ("/pods/default/b".to_string(), b"2".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn bus_delivers_independently_per_group() {
        let bus = InMemoryMessageBus::new();
        bus.publish("node.n1.pods", b"msg1".to_vec()).await.unwrap();
        bus.publish("node.n1.pods", b"msg2".to_vec()).await.unwrap();

        let a = bus.poll("node.n1.pods", "agent-a", 10).await.unwrap();
        let b = bus.poll("node.n1.pods", "agent-b", 1).await.unwrap();

        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].payload, b"msg1".to_vec());
    }

    #[tokio::test]
    async fn bus_does_not_redeliver_once_polled() {
        let bus = InMemoryMessageBus::new();
        bus.publish("t", b"msg1".to_vec()).await.unwrap();

        let first = bus.poll("t", "g", 10).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = bus.poll("t", "g", 10).await.unwrap();
        assert!(second.is_empty());
    }
}
