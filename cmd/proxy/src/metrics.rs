use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// `proxy_rules_programmed_total` / `proxy_rule_errors_total`, a flat pair in
/// the same idiom as `SchedulerMetrics`/`AgentMetrics` — the proxy isn't one
/// of the five object-reconciling controllers `flotilla_controller_core` was
/// built for, so it gets its own small registry rather than that module's
/// per-`ControllerId` `Family`.
pub struct ProxyMetrics {
    registry: Registry,
    rules_programmed_total: Counter,
    rule_errors_total: Counter,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let rules_programmed_total = Counter::default();
        let rule_errors_total = Counter::default();
        registry.register(
            "flotilla_service_proxy_rules_programmed_total",
            "Total number of successful CREATE/UPDATE/DELETE rule programming operations",
            rules_programmed_total.clone(),
        );
        registry.register(
            "flotilla_service_proxy_rules_failed_total",
            "Total number of rule programming operations that failed",
            rule_errors_total.clone(),
        );
        Self {
            registry,
            rules_programmed_total,
            rule_errors_total,
        }
    }

    pub fn program_succeeded(&self) {
        self.rules_programmed_total.inc();
    }

    pub fn program_failed(&self) {
        self.rule_errors_total.inc();
    }

    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("metrics encoding is infallible for well-formed families");
        buffer
    }
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}
