use std::sync::Arc;

use flotilla_api_client::FlotillaClient;
use flotilla_controller_core::{run_poll_loop, ControllerId, ControllerMetrics};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::info;

use crate::reconcile::{list_targets, reconcile};

pub const CONTROLLER_ID: ControllerId = "hpa";

/// Runs the HPAController's poll loop until `shutdown` signals true.
pub async fn run(
    client: FlotillaClient,
    metrics: Arc<ControllerMetrics>,
    poll_interval: Option<Duration>,
    shutdown: watch::Receiver<bool>,
) {
    info!(controller = CONTROLLER_ID, "starting controller");
    let list_client = client.clone();
    let reconcile_client = client.clone();
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
            async move { reconcile(&client, &key).await }
        },
    )
    .await;
}
