use std::sync::Arc;

use flotilla_apiserver::wire::PodCommand;
use flotilla_model::{ContainerPort, Pod, PodPhase, PodStatus};
use tracing::{error, info, warn};

use crate::engine::ContainerParams;
use crate::metrics::AgentMetrics;
use crate::state::{container_name, pause_container_name, AgentState, LocalPodRecord};

/// The pause container's image: a tiny long-lived no-op, the same role
/// `registry.k8s.io/pause` plays in real Kubernetes — it exists only so
/// sibling containers have a network namespace to join.
const PAUSE_IMAGE: &str = "flotilla/pause:latest";

/// Consumer group for this node's own Pod topic (spec.md §6). One process
/// consumes each node's topic, so a fixed name is fine — unlike the
/// cluster-wide scheduler topic, there's no risk of collision with another
/// node's consumers since the topic name already embeds the node name.
pub const AGENT_GROUP: &str = "agent";

/// Dispatches one `PodCommand` delivery, per spec.md §4.3's ADD/UPDATE/DELETE
/// semantics. Returns whether the delivery should be acked — mirroring the
/// scheduler's "ack only on success" redelivery design (spec.md §5), anything
/// that fails because of a transient API/engine error is left unacked so the
/// next poll retries it.
pub async fn handle_command(state: &Arc<AgentState>, metrics: &Arc<AgentMetrics>, command: PodCommand) -> bool {
    match command {
        PodCommand::Add { pod } => handle_add(state, metrics, pod).await,
        PodCommand::Update { pod } => handle_update(state, pod).await,
        PodCommand::Delete { namespace, name } => handle_delete(state, &namespace, &name).await,
        PodCommand::Heartbeat => {
            // No known producer publishes this variant onto a Pod topic as of
            // this build; treated as a harmless no-op rather than an error.
            true
        }
    }
}

async fn handle_add(state: &Arc<AgentState>, metrics: &Arc<AgentMetrics>, pod: Pod) -> bool {
    let namespace = pod.meta.namespace.clone().unwrap_or_else(|| "default".to_string());
    let name = pod.meta.name.clone();
    info!(%namespace, %name, "adding pod");

    let declared_volumes: std::collections::HashSet<&str> = pod.spec.volumes.iter().map(|v| v.name.as_str()).collect();
    for container in &pod.spec.containers {
        for mount in &container.volume_mounts {
            if !declared_volumes.contains(mount.name.as_str()) {
                error!(%namespace, %name, container = %container.name, volume = %mount.name, "mount references undeclared volume");
                report_failed(
                    state,
                    &namespace,
                    &name,
                    &format!("container {} mounts undeclared volume {}", container.name, mount.name),
                )
                .await;
                metrics.pod_failed();
                return true;
            }
        }
    }

    let mount_points = state.volumes.resolve_volumes(&pod.spec, &namespace).await;

    let overlay_ip = match state.ips.allocate() {
        Some(ip) => ip,
        None => {
            error!(%namespace, %name, "overlay IP range exhausted");
            report_failed(state, &namespace, &name, "overlay IP range exhausted").await;
            metrics.pod_failed();
            return true;
        }
    };

    if let Err(error) = state.client.update_pod_ip(&namespace, &name, &overlay_ip.to_string()).await {
        error!(%namespace, %name, %error, "failed to write back overlay IP");
        state.ips.release(overlay_ip);
        return false;
    }

    let mut container_ids = Vec::new();
    let pause_name = pause_container_name(&pod);
    let pause_params = ContainerParams {
        name: pause_name.clone(),
        image: PAUSE_IMAGE.to_string(),
        command: Vec::new(),
        args: Vec::new(),
        port_bindings: Vec::new(),
        resources: Default::default(),
        mounts: Vec::new(),
        security_context: Default::default(),
        network_namespace_of: None,
    };

    let created = create_and_start(state, &pause_params).await;
    let Some(pause_id) = created else {
        cleanup_failed_add(state, &namespace, &name, overlay_ip, &container_ids, &mount_points, metrics).await;
        return true;
    };
    container_ids.push(pause_id.clone());

    for container in &pod.spec.containers {
        let security_context = pod.effective_security_context(container);
        let mounts = container
            .volume_mounts
            .iter()
            .filter_map(|mount| {
                mount_points.get(&mount.name).map(|host_path| (host_path.clone(), mount.mount_path.clone(), mount.read_only))
            })
            .collect();
        let params = ContainerParams {
            name: container_name(&pod, &container.name),
            image: container.image.clone(),
            command: container.command.clone(),
            args: container.args.clone(),
            port_bindings: container.ports.iter().map(|p: &ContainerPort| p.container_port).collect(),
            resources: container.resources,
            mounts,
            security_context,
            network_namespace_of: Some(pause_id.clone()),
        };

        match create_and_start(state, &params).await {
            Some(container_id) => container_ids.push(container_id),
            None => {
                cleanup_failed_add(state, &namespace, &name, overlay_ip, &container_ids, &mount_points, metrics).await;
                return true;
            }
        }
    }

    state.record_pod(
        &namespace,
        &name,
        LocalPodRecord {
            container_ids,
            overlay_ip: Some(overlay_ip),
            mount_points: mount_points.values().cloned().collect(),
        },
    );

    let status = PodStatus { phase: Some(PodPhase::Running), subnet_ip: Some(overlay_ip.to_string()), ..pod.status };
    if let Err(error) = state.client.update_pod_status(&namespace, &name, &status).await {
        error!(%namespace, %name, %error, "failed to report RUNNING status");
    }
    metrics.pod_started();
    true
}

async fn create_and_start(state: &Arc<AgentState>, params: &ContainerParams) -> Option<String> {
    let container_id = match state.engine.create(params).await {
        Ok(id) => id,
        Err(error) => {
            error!(container = %params.name, %error, "failed to create container");
            return None;
        }
    };
    if let Err(error) = state.engine.start(&container_id).await {
        error!(container = %params.name, %error, "failed to start container");
        return None;
    }
    Some(container_id)
}

async fn cleanup_failed_add(
    state: &Arc<AgentState>,
    namespace: &str,
    name: &str,
    overlay_ip: std::net::Ipv4Addr,
    container_ids: &[String],
    mount_points: &std::collections::HashMap<String, String>,
    metrics: &Arc<AgentMetrics>,
) {
    for container_id in container_ids {
        let _ = state.engine.stop(container_id).await;
        let _ = state.engine.remove(container_id).await;
    }
    state.ips.release(overlay_ip);
    state.volumes.release_volumes(&mount_points.values().cloned().collect::<Vec<_>>()).await;
    report_failed(state, namespace, name, "one or more containers failed to start").await;
    metrics.pod_failed();
}

async fn report_failed(state: &Arc<AgentState>, namespace: &str, name: &str, message: &str) {
    let status = PodStatus { phase: Some(PodPhase::Failed), message: Some(message.to_string()), ..Default::default() };
    if let Err(error) = state.client.update_pod_status(namespace, name, &status).await {
        error!(%namespace, %name, %error, "failed to report FAILED status");
    }
}

/// UPDATE carries only label changes (spec.md §4.3: "UPDATE = labels-only"):
/// nothing to do on the agent side since labels don't affect running
/// containers, so this always succeeds.
async fn handle_update(_state: &Arc<AgentState>, pod: Pod) -> bool {
    info!(namespace = ?pod.meta.namespace, name = %pod.meta.name, "pod labels updated, no container action needed");
    true
}

async fn handle_delete(state: &Arc<AgentState>, namespace: &str, name: &str) -> bool {
    info!(%namespace, %name, "deleting pod");
    let Some(record) = state.remove_pod(namespace, name) else {
        warn!(%namespace, %name, "delete for pod with no local record, nothing to clean up");
        return true;
    };

    for container_id in &record.container_ids {
        if let Err(error) = state.engine.stop(container_id).await {
            warn!(%container_id, %error, "failed to stop container during delete");
        }
        if let Err(error) = state.engine.remove(container_id).await {
            warn!(%container_id, %error, "failed to remove container during delete");
        }
    }

    if let Some(ip) = record.overlay_ip {
        state.ips.release(ip);
    }
    state.volumes.release_volumes(&record.mount_points).await;
    true
}
