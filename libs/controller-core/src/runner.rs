use std::future::Future;
use std::sync::Arc;

use flotilla_model::ObjectKey;
use tokio::time::{interval, Duration};
use tracing::{error, info, trace};

use crate::backoff::BackoffCache;
use crate::id::{ControllerId, DEFAULT_RECONCILE_INTERVAL};
use crate::metrics::ControllerMetrics;

/// Outcome of reconciling a single object: either reconciled cleanly, or the
/// caller's own error that the loop turns into a per-object backoff.
pub type ReconcileResult = Result<(), String>;

/// Drives a poll-based reconcile loop: every `interval`, lists the controller's
/// objects (via `list_fn`) and reconciles each one (via `reconcile_fn`),
/// recording metrics and applying per-object exponential backoff on failure.
///
/// This replaces the teacher's watch/informer-driven `kube::runtime::Controller`
/// (spec.md §4: polling/topic consumption stands in for etcd watches).
pub async fn run_poll_loop<L, LFut, R, RFut>(
    controller_id: ControllerId,
    metrics: Arc<ControllerMetrics>,
    poll_interval: Option<Duration>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
    list_fn: L,
    reconcile_fn: R,
) where
    L: Fn() -> LFut,
    LFut: Future<Output = Result<Vec<ObjectKey>, String>>,
    R: Fn(ObjectKey) -> RFut,
    RFut: Future<Output = ReconcileResult>,
{
    let backoffs = BackoffCache::new();
    let mut ticker = interval(poll_interval.unwrap_or(DEFAULT_RECONCILE_INTERVAL));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(controller = controller_id, "shutting down poll loop");
                    return;
                }
            }
        }

        let keys = match list_fn().await {
            Ok(keys) => keys,
            Err(error) => {
                error!(controller = controller_id, %error, "failed to list objects");
                continue;
            }
        };

        for key in keys {
            if !backoffs.is_ready(&key).await {
                trace!(controller = controller_id, %key, "skipping, still backing off");
                continue;
            }

            let guard = metrics.start_reconcile();
            match reconcile_fn(key.clone()).await {
                Ok(()) => {
                    drop(guard);
                    backoffs.reset(&key).await;
                    trace!(controller = controller_id, %key, "reconciled");
                }
                Err(error) => {
                    drop(guard);
                    metrics.reconcile_error_inc();
                    let delay = backoffs.next_delay(&key).await;
                    error!(controller = controller_id, %key, %error, ?delay, "reconcile failed, backing off");
                }
            }
        }
    }
}
