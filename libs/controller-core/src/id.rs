use tokio::time::Duration;

/// Static name of a controller ("replicaset", "hpa", ...), used as a metrics
/// label and as the consumer-group name controllers register under.
pub type ControllerId = &'static str;

/// How often a controller re-lists its watched prefix absent any other trigger,
/// mirroring the teacher's `DEFAULT_RECONCILE_INTERVAL` (spec.md §4: "poll on an
/// interval" is the explicit replacement for etcd-style watches).
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(10);
