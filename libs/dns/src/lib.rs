//! DNSController: resolves each DNS record's `host -> namespace/service`
//! mappings to the target Service's ClusterIP and publishes the result to a
//! cluster-local resolver, treated as an external sink (spec.md §4.5).

pub mod controller;
pub mod reconcile;
pub mod sink;

pub use controller::{run, CONTROLLER_ID};
pub use sink::{HostsFileResolverSink, ResolverSink, SimulatedResolverSink};
