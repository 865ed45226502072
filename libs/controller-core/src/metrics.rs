use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::id::ControllerId;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ControllerLabels {
    controller: String,
}

/// Per-controller counters and histograms, registered once at startup and
/// shared (via `Arc`) between the reconcile loop and the metrics HTTP route —
/// same shape as the teacher's `ControllerMetrics`, translated from
/// OpenTelemetry `Meter` instruments to `prometheus_client` families
/// (SPEC_FULL.md §0: the pack has no OpenTelemetry exporter dependency).
pub struct ControllerMetrics {
    controller: String,
    reconcile_total: Family<ControllerLabels, Counter>,
    reconcile_errors_total: Family<ControllerLabels, Counter>,
    reconcile_duration_seconds: Family<ControllerLabels, Histogram>,
    owned_objects: Family<ControllerLabels, Gauge>,
}

impl ControllerMetrics {
    fn new(controller: ControllerId, registry: &mut Registry) -> Self {
        let reconcile_total = Family::default();
        let reconcile_errors_total = Family::default();
        let reconcile_duration_seconds = Family::new_with_constructor(
            (|| Histogram::new(exponential_buckets(0.001, 2.0, 16))) as fn() -> Histogram,
        );
        let owned_objects = Family::default();

        registry.register(
            "flotilla_controller_reconcile_total",
            "Total number of reconcile passes run",
            reconcile_total.clone(),
        );
        registry.register(
            "flotilla_controller_reconcile_errors_total",
            "Total number of reconcile passes that failed",
            reconcile_errors_total.clone(),
        );
        registry.register(
            "flotilla_controller_reconcile_duration_seconds",
            "Duration of a single object's reconcile pass",
            reconcile_duration_seconds.clone(),
        );
        registry.register(
            "flotilla_controller_owned_objects",
            "Number of objects currently owned by this controller",
            owned_objects.clone(),
        );

        Self {
            controller: controller.to_string(),
            reconcile_total,
            reconcile_errors_total,
            reconcile_duration_seconds,
            owned_objects,
        }
    }

    fn labels(&self) -> ControllerLabels {
        ControllerLabels {
            controller: self.controller.clone(),
        }
    }

    pub fn reconcile_error_inc(&self) {
        self.reconcile_errors_total.get_or_create(&self.labels()).inc();
    }

    pub fn set_owned_objects(&self, count: i64) {
        self.owned_objects.get_or_create(&self.labels()).set(count);
    }

    /// Starts a measurement; the returned guard records the reconcile count and
    /// duration histogram when dropped, regardless of success or failure.
    pub fn start_reconcile(&self) -> ReconcileMeasurer<'_> {
        self.reconcile_total.get_or_create(&self.labels()).inc();
        ReconcileMeasurer {
            metrics: self,
            start: Instant::now(),
        }
    }
}

pub struct ReconcileMeasurer<'a> {
    metrics: &'a ControllerMetrics,
    start: Instant,
}

impl Drop for ReconcileMeasurer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.metrics
            .reconcile_duration_seconds
            .get_or_create(&self.metrics.labels())
            .observe(elapsed);
    }
}

/// Owns the process-wide metrics registry plus one [`ControllerMetrics`] per
/// registered controller, mirroring the teacher's `Metrics` struct.
pub struct Metrics {
    registry: Registry,
    pub controllers: HashMap<ControllerId, Arc<ControllerMetrics>>,
}

impl Metrics {
    pub fn new(controller_names: &[ControllerId]) -> Self {
        let mut registry = Registry::default();
        let controllers = controller_names
            .iter()
            .map(|&id| (id, Arc::new(ControllerMetrics::new(id, &mut registry))))
            .collect();
        Self {
            registry,
            controllers,
        }
    }

    pub fn controller(&self, id: ControllerId) -> Arc<ControllerMetrics> {
        self.controllers
            .get(id)
            .expect("all controller ids must be registered up front")
            .clone()
    }

    /// Renders the registry in Prometheus text exposition format for the
    /// `/metrics` route (spec.md ambient stack addition, SPEC_FULL.md §0).
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("metrics encoding is infallible for well-formed families");
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_controller() {
        let metrics = Metrics::new(&["replicaset"]);
        let controller = metrics.controller("replicaset");
        let guard = controller.start_reconcile();
        drop(guard);
        let text = metrics.encode();
        assert!(text.contains("flotilla_controller_reconcile_total"));
        assert!(text.contains("replicaset"));
    }
}
