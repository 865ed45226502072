use std::collections::HashSet;
use std::sync::Arc;

use flotilla_model::{PodPhase, PodStatus};
use tracing::{error, warn};

use crate::metrics::AgentMetrics;
use crate::state::AgentState;

/// Cross-checks the engine's live container set against the local Pod table
/// (spec.md §4.3: "periodic reconcile pass cross-checks engine's live
/// container set against the local Pod table"). A Pod whose containers have
/// all vanished (crashed engine, manual `docker rm`, host reboot) is
/// transitioned to FAILED and counted in `pod_reconcile_drift_total`.
pub async fn reconcile_once(state: &Arc<AgentState>, metrics: &Arc<AgentMetrics>) {
    let running: HashSet<String> = match state.engine.list_running().await {
        Ok(ids) => ids.into_iter().collect(),
        Err(error) => {
            error!(%error, "failed to list running containers for reconcile");
            return;
        }
    };

    for (namespace, name, record) in state.all_pods() {
        if record.container_ids.is_empty() {
            continue;
        }
        let all_vanished = record.container_ids.iter().all(|id| !running.contains(id));
        if !all_vanished {
            continue;
        }

        warn!(%namespace, %name, "all containers for pod vanished from engine, marking FAILED");
        metrics.reconcile_drift();

        let status = PodStatus {
            phase: Some(PodPhase::Failed),
            message: Some("containers vanished from container engine".to_string()),
            ..Default::default()
        };
        if let Err(error) = state.client.update_pod_status(&namespace, &name, &status).await {
            error!(%namespace, %name, %error, "failed to report drift-induced FAILED status");
        }

        if let Some(mut removed) = state.remove_pod(&namespace, &name) {
            if let Some(ip) = removed.overlay_ip.take() {
                state.ips.release(ip);
            }
            state.volumes.release_volumes(&removed.mount_points).await;
        }
    }
}
