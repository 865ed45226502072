use std::sync::Arc;

use flotilla_controller_core::Metrics;
use flotilla_faas::{ImageBuilder, SimulatedImageBuilder};
use flotilla_store::{KvStore, MessageBus};
use tokio::sync::RwLock;

use crate::config::ApiServerConfig;

/// IDs the two housekeeping loops register under, reusing
/// [`flotilla_controller_core::ControllerMetrics`] the same way every
/// reconcile-loop controller does (SPEC_FULL.md §4.5's "every controller ...
/// registers under a `ControllerId`" convention extended to the API server's
/// own background loops).
pub const NODE_LIVENESS_ID: &str = "node-liveness";
pub const FUNCTION_AUTOSCALE_ID: &str = "function-autoscale";

/// Shared, cheaply-cloneable server state passed to every axum handler and
/// both housekeeping loops. All fields are `Arc`-backed so `.clone()` is just
/// pointer copies, matching the teacher's `KaniopState` shape
/// (`libs/operator/src/controller.rs::State`).
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub bus: Arc<dyn MessageBus>,
    pub config: Arc<ApiServerConfig>,
    pub metrics: Arc<Metrics>,
    /// Guards the Function table (spec.md §5): autoscaling and deletion take
    /// the write side, invocation the read side, and the first-Pod bootstrap
    /// performs an explicit release-then-reacquire upgrade.
    pub function_lock: Arc<RwLock<()>>,
    pub image_builder: Arc<dyn ImageBuilder>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        kv: Arc<dyn KvStore>,
        bus: Arc<dyn MessageBus>,
        config: ApiServerConfig,
    ) -> Self {
        let image_builder = Arc::new(SimulatedImageBuilder::new(config.function_registry.clone()));
        Self {
            kv,
            bus,
            metrics: Arc::new(Metrics::new(&[NODE_LIVENESS_ID, FUNCTION_AUTOSCALE_ID])),
            config: Arc::new(config),
            function_lock: Arc::new(RwLock::new(())),
            image_builder,
            http: reqwest::Client::new(),
        }
    }
}
