//! The API server's two background loops (spec.md §4.1): node liveness
//! timeout and Function request-driven autoscaling. Shaped after
//! `flotilla-pv-controller`'s `housekeeping_task` — a `tokio::select!` between
//! an interval ticker and a shutdown watch, run alongside the HTTP server by
//! `cmd/apiserver`'s `tokio::join!`.

use chrono::Utc;
use flotilla_faas::build_pod_for_function;
use flotilla_model::{Function, Kind, Node, NodeStatus, ObjectKey, Pod};
use flotilla_store::TypedBus;
use tokio::sync::watch;
use tokio::time;

use crate::crud;
use crate::routes::pods::submit_to_scheduler;
use crate::state::{AppState, FUNCTION_AUTOSCALE_ID, NODE_LIVENESS_ID};
use crate::wire::PodCommand;

/// Flips any `Online` node whose heartbeat has gone stale to `Offline`
/// (spec.md §4.1: "a background loop scans for nodes whose last heartbeat
/// exceeds the timeout").
pub async fn run_node_liveness(state: AppState, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(loop_id = NODE_LIVENESS_ID, "starting housekeeping loop");
    let metrics = state.metrics.controller(NODE_LIVENESS_ID);
    let mut ticker = time::interval(state.config.liveness_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let guard = metrics.start_reconcile();
                if let Err(err) = sweep_stale_nodes(&state).await {
                    tracing::warn!(%err, "node liveness sweep failed");
                    metrics.reconcile_error_inc();
                }
                drop(guard);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn sweep_stale_nodes(state: &AppState) -> crate::error::Result<()> {
    let timeout = chrono::Duration::from_std(state.config.node_timeout).unwrap_or(chrono::Duration::seconds(10));
    let now = Utc::now();
    let nodes: Vec<Node> = crud::list_all(state.kv.as_ref(), Kind::Node).await?;
    for mut node in nodes {
        if node.status == NodeStatus::Online && node.is_stale(now, timeout) {
            node.status = NodeStatus::Offline;
            let key = ObjectKey::cluster_scoped(Kind::Node, &node.meta.name);
            tracing::warn!(node = %node.meta.name, "node heartbeat timed out, marking offline");
            crud::put(state.kv.as_ref(), &key, &node).await?;
        }
    }
    Ok(())
}

/// Compares each Function's `requests_since_tick / pod_count` load ratio
/// against the configured high/low thresholds and scales its backing Pod
/// count accordingly, then resets the counter (spec.md §4.1 Function
/// autoscaling pass).
pub async fn run_function_autoscale(state: AppState, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(loop_id = FUNCTION_AUTOSCALE_ID, "starting housekeeping loop");
    let metrics = state.metrics.controller(FUNCTION_AUTOSCALE_ID);
    let mut ticker = time::interval(state.config.autoscale_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let guard = metrics.start_reconcile();
                if let Err(err) = autoscale_pass(&state).await {
                    tracing::warn!(%err, "function autoscale pass failed");
                    metrics.reconcile_error_inc();
                }
                drop(guard);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn autoscale_pass(state: &AppState) -> crate::error::Result<()> {
    let _write_guard = state.function_lock.write().await;
    let functions: Vec<Function> = crud::list_all(state.kv.as_ref(), Kind::Function).await?;
    for mut function in functions {
        let pod_count = function.status.pod_names.len();
        let ratio = if pod_count == 0 {
            if function.status.requests_since_tick > 0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            function.status.requests_since_tick as f64 / pod_count as f64
        };

        if ratio > state.config.autoscale_high_threshold {
            scale_up(state, &mut function).await?;
        } else if ratio < state.config.autoscale_low_threshold && pod_count > 1 {
            scale_down(state, &mut function).await?;
        }

        function.status.requests_since_tick = 0;
        let key = ObjectKey::namespaced(
            Kind::Function,
            function.meta.namespace.clone().unwrap_or_default(),
            &function.meta.name,
        );
        crud::put(state.kv.as_ref(), &key, &function).await?;
    }
    Ok(())
}

async fn scale_up(state: &AppState, function: &mut Function) -> crate::error::Result<()> {
    let namespace = function.meta.namespace.clone().unwrap_or_default();
    let pod_name = format!("{}-{}", function.meta.name, function.status.pod_names.len());
    let pod = match build_pod_for_function(function, &namespace, &pod_name) {
        Ok(pod) => pod,
        Err(err) => {
            tracing::warn!(function = %function.meta.name, %err, "cannot scale up function with no built image");
            return Ok(());
        }
    };
    let pod_key = ObjectKey::namespaced(Kind::Pod, &namespace, &pod_name);
    crud::put(state.kv.as_ref(), &pod_key, &pod).await?;
    submit_to_scheduler(state.bus.as_ref(), &pod).await?;
    function.status.pod_names.push(pod_name);
    tracing::info!(function = %function.meta.name, "scaled function up by one pod");
    Ok(())
}

async fn scale_down(state: &AppState, function: &mut Function) -> crate::error::Result<()> {
    let Some(pod_name) = function.status.pod_names.pop() else {
        return Ok(());
    };
    let namespace = function.meta.namespace.clone().unwrap_or_default();
    let pod_key = ObjectKey::namespaced(Kind::Pod, &namespace, &pod_name);
    if let Some(pod) = crud::get_typed::<Pod>(state.kv.as_ref(), &pod_key).await? {
        if let Some(node_name) = pod.status.node_name {
            let node_key = ObjectKey::cluster_scoped(Kind::Node, &node_name);
            if let Some(node) = crud::get_typed::<Node>(state.kv.as_ref(), &node_key).await? {
                TypedBus::new(state.bus.as_ref())
                    .publish(&node.pod_topic, &PodCommand::Delete { namespace: namespace.clone(), name: pod_name.clone() })
                    .await?;
            }
        }
    }
    crud::delete(state.kv.as_ref(), &pod_key).await?;
    tracing::info!(function = %function.meta.name, "scaled function down by one pod");
    Ok(())
}
