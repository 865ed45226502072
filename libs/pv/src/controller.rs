use std::sync::Arc;
use std::time::Duration as StdDuration;

use flotilla_api_client::FlotillaClient;
use flotilla_controller_core::{run_poll_loop, ControllerId, ControllerMetrics};
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::info;

use crate::backend::StorageBackend;
use crate::config::PvProvisionerConfig;
use crate::reconcile::{list_pending_claims, materialize_static_volumes, reconcile_claim, unbind_orphans};

pub const CONTROLLER_ID: ControllerId = "pv";

const HOUSEKEEPING_INTERVAL: StdDuration = StdDuration::from_secs(15);

/// Runs the PVController's three passes (spec.md §4.5): binding/provisioning
/// `Pending` PVCs drives the main poll loop, while materializing `static` PVs
/// and unbinding orphans run as periodic background passes alongside it.
pub async fn run(
    client: FlotillaClient,
    backend: Arc<dyn StorageBackend>,
    config: PvProvisionerConfig,
    metrics: Arc<ControllerMetrics>,
    poll_interval: Option<Duration>,
    shutdown: watch::Receiver<bool>,
) {
    info!(controller = CONTROLLER_ID, "starting controller");

    let housekeeping_client = client.clone();
    let housekeeping_backend = backend.clone();
    let mut housekeeping_shutdown = shutdown.clone();
    let housekeeping_task = tokio::spawn(async move {
        let mut ticker = time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = materialize_static_volumes(&housekeeping_client, housekeeping_backend.as_ref()).await {
                        tracing::warn!(%err, "static volume materialization pass failed");
                    }
                    if let Err(err) = unbind_orphans(&housekeeping_client).await {
                        tracing::warn!(%err, "orphan binding pass failed");
                    }
                }
                _ = housekeeping_shutdown.changed() => {
                    if *housekeeping_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let list_client = client.clone();
    let reconcile_client = client.clone();
    run_poll_loop(
        CONTROLLER_ID,
        metrics,
        poll_interval,
        shutdown,
        move || {
            let client = list_client.clone();
            async move { list_pending_claims(&client).await }
        },
        move |key| {
            let client = reconcile_client.clone();
            let backend = backend.clone();
            let config = config.clone();
            async move { reconcile_claim(&client, backend.as_ref(), &config, &key).await }
        },
    )
    .await;

    housekeeping_task.abort();
}
