use std::sync::Arc;
use std::time::Duration as StdDuration;

use flotilla_api_client::FlotillaClient;
use flotilla_controller_core::{run_poll_loop, ControllerId, ControllerMetrics};
use flotilla_store::MessageBus;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::info;
use uuid::Uuid;

use crate::nodeport::NodePortManager;
use crate::reconcile::{list_targets, reconcile};

pub const CONTROLLER_ID: ControllerId = "service";

const NODE_PORT_SYNC_INTERVAL: StdDuration = StdDuration::from_secs(2);

/// Runs the ServiceController's poll loop and the NodePort manager's
/// convergence loop side by side until `shutdown` signals true.
pub async fn run(
    client: FlotillaClient,
    bus: Arc<dyn MessageBus>,
    metrics: Arc<ControllerMetrics>,
    poll_interval: Option<Duration>,
    shutdown: watch::Receiver<bool>,
) {
    info!(controller = CONTROLLER_ID, "starting controller");
    let nodeports = Arc::new(NodePortManager::new(
        bus.clone(),
        format!("service-controller-{}", Uuid::new_v4()),
    ));

    let sync_nodeports = nodeports.clone();
    let mut sync_shutdown = shutdown.clone();
    let sync_task = tokio::spawn(async move {
        let mut ticker = time::interval(NODE_PORT_SYNC_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = sync_nodeports.sync_once(64).await {
                        tracing::warn!(%err, "nodeport sync failed");
                    }
                }
                _ = sync_shutdown.changed() => {
                    if *sync_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let list_client = client.clone();
    let reconcile_client = client.clone();
    let reconcile_bus = bus.clone();
    let reconcile_nodeports = nodeports.clone();
    run_poll_loop(
        CONTROLLER_ID,
        metrics,
        poll_interval,
        shutdown,
        move || {
            let client = list_client.clone();
            async move { list_targets(&client).await }
        },
        move |key| {
            let client = reconcile_client.clone();
            let bus = reconcile_bus.clone();
            let nodeports = reconcile_nodeports.clone();
            async move { reconcile(&client, &bus, &nodeports, &key).await }
        },
    )
    .await;

    sync_task.abort();
}
