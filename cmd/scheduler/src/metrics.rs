use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// `scheduler_bind_total` / `scheduler_bind_failures_total`, per SPEC_FULL.md
/// §4.2 — deliberately a flat pair rather than `flotilla_controller_core`'s
/// per-`ControllerId` `Family`, since the scheduler isn't one of the five
/// object-reconciling controllers that module was built for.
pub struct SchedulerMetrics {
    registry: Registry,
    bind_total: Counter,
    bind_failures_total: Counter,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let bind_total = Counter::default();
        let bind_failures_total = Counter::default();
        registry.register(
            "flotilla_scheduler_bind_total",
            "Total number of successful Pod->Node binds",
            bind_total.clone(),
        );
        registry.register(
            "flotilla_scheduler_bind_failures_total",
            "Total number of bind attempts that failed",
            bind_failures_total.clone(),
        );
        Self {
            registry,
            bind_total,
            bind_failures_total,
        }
    }

    pub fn bind_succeeded(&self) {
        self.bind_total.inc();
    }

    pub fn bind_failed(&self) {
        self.bind_failures_total.inc();
    }

    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("metrics encoding is infallible for well-formed families");
        buffer
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
