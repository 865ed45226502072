use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Standalone agent metrics, the same flat-pair shape as
/// `flotilla-scheduler-bin`'s `SchedulerMetrics` — the node agent isn't one of
/// the five object-reconciling controllers `flotilla_controller_core::Metrics`
/// is keyed for either.
pub struct AgentMetrics {
    registry: Registry,
    pods_started_total: Counter,
    pods_failed_total: Counter,
    /// Incremented whenever the periodic reconcile pass finds a Pod the agent
    /// believes is running but whose containers have vanished from the engine
    /// (SPEC_FULL.md §4.3).
    pod_reconcile_drift_total: Counter,
}

impl AgentMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let pods_started_total = Counter::default();
        let pods_failed_total = Counter::default();
        let pod_reconcile_drift_total = Counter::default();
        registry.register(
            "flotilla_agent_pods_started_total",
            "Total number of Pods this agent successfully brought to RUNNING",
            pods_started_total.clone(),
        );
        registry.register(
            "flotilla_agent_pods_failed_total",
            "Total number of Pods this agent transitioned to FAILED",
            pods_failed_total.clone(),
        );
        registry.register(
            "flotilla_agent_pod_reconcile_drift_total",
            "Total number of Pods found to have vanished containers during reconcile",
            pod_reconcile_drift_total.clone(),
        );
        Self { registry, pods_started_total, pods_failed_total, pod_reconcile_drift_total }
    }

    pub fn pod_started(&self) {
        self.pods_started_total.inc();
    }

    pub fn pod_failed(&self) {
        self.pods_failed_total.inc();
    }

    pub fn reconcile_drift(&self) {
        self.pod_reconcile_drift_total.inc();
    }

    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("metrics encoding is infallible for well-formed families");
        buffer
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}
