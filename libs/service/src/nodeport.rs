use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use flotilla_store::{MessageBus, StoreError, TypedBus};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Fixed cluster-wide NodePort range (spec.md §4.5.5, §6).
pub const NODE_PORT_RANGE: RangeInclusive<u16> = 30000..=32767;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodePortError {
    #[error("nodePort {0} is outside the allowed range 30000..=32767")]
    OutOfRange(u16),
    #[error("nodePort {0} is already held by another service")]
    Conflict(u16),
    #[error("no free nodePort remains in the allowed range")]
    Exhausted,
}

/// Convergence message broadcast on the NodePort topic so every
/// ServiceController instance's in-memory allocation table agrees
/// (spec.md §4.5.5: "broadcasting intent on a dedicated topic, each instance
/// maintaining a replicated set").
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum NodePortEvent {
    Allocate { port: u16, service: String },
    Deallocate { service: String },
}

/// Pure in-memory port table: `port -> owning service key`. Kept separate from
/// the bus-backed [`NodePortManager`] so the allocation rules are unit
/// testable without any I/O.
#[derive(Debug, Clone, Default)]
pub struct PortTable {
    ports: BTreeMap<u16, String>,
}

impl PortTable {
    /// `allocate(service, requested)`: if `requested` is held by a different
    /// service, fails; a same-service re-request is idempotent. With no
    /// request, picks the lowest free port.
    pub fn allocate(&mut self, service: &str, requested: Option<u16>) -> Result<u16, NodePortError> {
        match requested {
            Some(port) => {
                if !NODE_PORT_RANGE.contains(&port) {
                    return Err(NodePortError::OutOfRange(port));
                }
                match self.ports.get(&port) {
                    Some(owner) if owner != service => Err(NodePortError::Conflict(port)),
                    _ => {
                        self.release_other_ports(service, port);
                        self.ports.insert(port, service.to_string());
                        Ok(port)
                    }
                }
            }
            None => {
                for port in NODE_PORT_RANGE {
                    if !self.ports.contains_key(&port) {
                        self.release_other_ports(service, port);
                        self.ports.insert(port, service.to_string());
                        return Ok(port);
                    }
                }
                Err(NodePortError::Exhausted)
            }
        }
    }

    /// Drops any port `service` currently owns other than `keep` — a service
    /// update auto-releases its old port before taking the new one (spec.md
    /// §4.5.5), so a service never holds more than one port at a time.
    fn release_other_ports(&mut self, service: &str, keep: u16) {
        self.ports.retain(|port, owner| *port == keep || owner != service);
    }

    /// Removes the mapping owned by `service`, if any, returning the freed port.
    pub fn deallocate(&mut self, service: &str) -> Option<u16> {
        let port = self
            .ports
            .iter()
            .find(|(_, owner)| owner.as_str() == service)
            .map(|(port, _)| *port);
        if let Some(port) = port {
            self.ports.remove(&port);
        }
        port
    }

    pub fn apply_remote(&mut self, event: NodePortEvent) {
        match event {
            NodePortEvent::Allocate { port, service } => {
                self.ports.insert(port, service);
            }
            NodePortEvent::Deallocate { service } => {
                self.deallocate(&service);
            }
        }
    }
}

/// Cluster-scoped NodePort allocator. Wraps a [`PortTable`] with a bus
/// broadcast so multiple ServiceController instances converge on the same
/// allocation set (spec.md §4.5.5). Each instance polls the topic under its
/// own consumer group (`group`), so every instance observes every event,
/// including its own — applying an already-applied allocation is idempotent.
pub struct NodePortManager {
    table: Mutex<PortTable>,
    bus: Arc<dyn MessageBus>,
    topic: String,
    group: String,
}

/// Exposed so callers outside this crate that don't hold a [`NodePortManager`]
/// (e.g. the API server releasing a deleted Service's port) can still
/// broadcast a convergence event directly.
pub const NODE_PORT_TOPIC: &str = "nodeport.allocations";

impl NodePortManager {
    pub fn new(bus: Arc<dyn MessageBus>, group: impl Into<String>) -> Self {
        Self {
            table: Mutex::new(PortTable::default()),
            bus,
            topic: NODE_PORT_TOPIC.to_string(),
            group: group.into(),
        }
    }

    pub async fn allocate(&self, service: &str, requested: Option<u16>) -> Result<u16, NodePortError> {
        let port = {
            let mut table = self.table.lock().await;
            table.allocate(service, requested)?
        };
        self.broadcast(NodePortEvent::Allocate {
            port,
            service: service.to_string(),
        })
        .await;
        Ok(port)
    }

    pub async fn deallocate(&self, service: &str) {
        let freed = {
            let mut table = self.table.lock().await;
            table.deallocate(service)
        };
        if freed.is_some() {
            self.broadcast(NodePortEvent::Deallocate {
                service: service.to_string(),
            })
            .await;
        }
    }

    async fn broadcast(&self, event: NodePortEvent) {
        let bus = TypedBus::new(self.bus.as_ref());
        if let Err(err) = bus.publish(&self.topic, &event).await {
            tracing::warn!(%err, ?event, "failed to broadcast nodeport event");
        }
    }

    /// Drains pending convergence events from peers (and this instance's own
    /// prior broadcasts) and applies them to the local table. Intended to be
    /// driven by a background loop alongside the ServiceController's
    /// reconcile poll loop.
    pub async fn sync_once(&self, max: usize) -> Result<usize, StoreError> {
        let bus = TypedBus::new(self.bus.as_ref());
        let events: Vec<(String, NodePortEvent)> = bus.poll(&self.topic, &self.group, max).await?;
        let count = events.len();
        for (id, event) in events {
            {
                let mut table = self.table.lock().await;
                table.apply_remote(event);
            }
            bus.ack(&self.topic, &self.group, &id).await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_port_with_no_request() {
        let mut table = PortTable::default();
        assert_eq!(table.allocate("svc1", None).unwrap(), 30000);
        assert_eq!(table.allocate("svc2", None).unwrap(), 30001);
    }

    #[test]
    fn requested_port_held_by_other_service_conflicts() {
        let mut table = PortTable::default();
        table.allocate("svc1", Some(30080)).unwrap();
        assert_eq!(
            table.allocate("svc2", Some(30080)),
            Err(NodePortError::Conflict(30080))
        );
    }

    #[test]
    fn same_service_re_request_is_idempotent() {
        let mut table = PortTable::default();
        table.allocate("svc1", Some(30080)).unwrap();
        assert_eq!(table.allocate("svc1", Some(30080)), Ok(30080));
    }

    #[test]
    fn out_of_range_request_is_rejected() {
        let mut table = PortTable::default();
        assert_eq!(table.allocate("svc1", Some(29999)), Err(NodePortError::OutOfRange(29999)));
        assert_eq!(table.allocate("svc1", Some(32768)), Err(NodePortError::OutOfRange(32768)));
    }

    #[test]
    fn deallocate_frees_the_port_for_reuse() {
        let mut table = PortTable::default();
        table.allocate("svc1", Some(30080)).unwrap();
        assert_eq!(table.deallocate("svc1"), Some(30080));
        assert_eq!(table.allocate("svc2", Some(30080)), Ok(30080));
    }

    #[test]
    fn requesting_a_different_port_releases_the_old_one() {
        let mut table = PortTable::default();
        table.allocate("svc1", Some(30080)).unwrap();
        assert_eq!(table.allocate("svc1", Some(30090)), Ok(30090));
        // the old port is free for another service to take
        assert_eq!(table.allocate("svc2", Some(30080)), Ok(30080));
    }

    #[test]
    fn remote_events_apply_to_the_local_table() {
        let mut table = PortTable::default();
        table.apply_remote(NodePortEvent::Allocate {
            port: 30080,
            service: "svc1".into(),
        });
        assert_eq!(table.allocate("svc2", Some(30080)), Err(NodePortError::Conflict(30080)));
        table.apply_remote(NodePortEvent::Deallocate {
            service: "svc1".into(),
        });
        assert_eq!(table.allocate("svc2", Some(30080)), Ok(30080));
    }
}
