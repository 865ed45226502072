//! ServiceController: ClusterIP assignment, NodePort allocation, endpoint
//! computation, and per-node proxy fan-out (spec.md §4.5). Grounded on the
//! teacher's `libs/group` controller/reconcile split, with the NodePort
//! manager's cluster-wide convergence modeled as a bus-broadcast replicated
//! set (spec.md §4.5.5).

pub mod controller;
pub mod ipam;
pub mod nodeport;
pub mod reconcile;
pub mod wire;

pub use controller::{run, CONTROLLER_ID};
pub use nodeport::{
    NodePortError, NodePortEvent, NodePortManager, PortTable, NODE_PORT_RANGE, NODE_PORT_TOPIC,
};
pub use reconcile::compute_endpoints;
pub use wire::{ProxyAction, ProxyEndpoint, ProxyMessage};
