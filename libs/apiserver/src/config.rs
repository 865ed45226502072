use std::time::Duration;

/// Tunables for the API server's two housekeeping loops (spec.md §4.1),
/// threaded in from `cmd/apiserver`'s `clap::Parser` flags (SPEC_FULL.md §4.1).
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub node_timeout: Duration,
    pub liveness_interval: Duration,
    pub autoscale_interval: Duration,
    pub autoscale_high_threshold: f64,
    pub autoscale_low_threshold: f64,
    pub function_registry: String,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            node_timeout: Duration::from_secs(10),
            liveness_interval: Duration::from_secs(5),
            autoscale_interval: Duration::from_secs(15),
            autoscale_high_threshold: 0.8,
            autoscale_low_threshold: 0.2,
            function_registry: "registry.flotilla.internal".to_string(),
        }
    }
}
