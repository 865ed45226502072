use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use flotilla_model::{ResourceRequirements, SecurityContext};

/// Everything the node agent computes from a Pod/Container spec before handing
/// it to the engine (spec.md §4.3: "image, command+args, port bindings,
/// resource shares/quotas/mem caps, mounts, security context...").
#[derive(Debug, Clone)]
pub struct ContainerParams {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub port_bindings: Vec<u16>,
    pub resources: ResourceRequirements,
    /// `(host_path, mount_path, read_only)`.
    pub mounts: Vec<(String, String, bool)>,
    pub security_context: SecurityContext,
    /// Set for every sibling container in a Pod so it shares the pause
    /// container's network namespace (spec.md §4.3: "starts the pause/infra
    /// container first so sibling containers share its network namespace").
    pub network_namespace_of: Option<String>,
}

/// The node agent's "external collaborator" (spec.md §9 design notes):
/// everything that actually talks to a container runtime lives behind this
/// trait, the same "narrow interface + simulation fallback" shape as
/// `StorageBackend`/`ResolverSink`/`NatBackend` elsewhere in this workspace.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn create(&self, params: &ContainerParams) -> Result<String, String>;
    async fn start(&self, container_id: &str) -> Result<(), String>;
    async fn stop(&self, container_id: &str) -> Result<(), String>;
    async fn remove(&self, container_id: &str) -> Result<(), String>;
    /// Container IDs the engine currently reports as running, for the
    /// periodic reconcile pass (spec.md §4.3) to cross-check against the
    /// local Pod table.
    async fn list_running(&self) -> Result<Vec<String>, String>;
}

/// Logs intended lifecycle calls instead of driving a real container runtime
/// — the default engine, and the only one available without `--features
/// docker`.
#[derive(Default)]
pub struct SimulatedEngine {
    running: Mutex<HashSet<String>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContainerEngine for SimulatedEngine {
    async fn create(&self, params: &ContainerParams) -> Result<String, String> {
        let container_id = format!("sim-{}", params.name);
        tracing::info!(
            container = %container_id,
            image = %params.image,
            ports = ?params.port_bindings,
            "simulated container create"
        );
        Ok(container_id)
    }

    async fn start(&self, container_id: &str) -> Result<(), String> {
        tracing::info!(container = %container_id, "simulated container start");
        self.running.lock().expect("engine lock poisoned").insert(container_id.to_string());
        Ok(())
    }

    async fn stop(&self, container_id: &str) -> Result<(), String> {
        tracing::info!(container = %container_id, "simulated container stop");
        self.running.lock().expect("engine lock poisoned").remove(container_id);
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> Result<(), String> {
        tracing::info!(container = %container_id, "simulated container remove");
        self.running.lock().expect("engine lock poisoned").remove(container_id);
        Ok(())
    }

    async fn list_running(&self) -> Result<Vec<String>, String> {
        Ok(self.running.lock().expect("engine lock poisoned").iter().cloned().collect())
    }
}

#[cfg(feature = "docker")]
pub use docker::BollardEngine;

#[cfg(feature = "docker")]
mod docker {
    use async_trait::async_trait;
    use bollard::container::{
        Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    };
    use bollard::models::{HostConfig, PortBinding};
    use bollard::Docker;
    use std::collections::HashMap;

    use super::{ContainerEngine, ContainerParams};

    /// Drives a real Docker daemon through `bollard`, behind `--features
    /// docker` (SPEC_FULL.md §4.3).
    pub struct BollardEngine {
        docker: Docker,
    }

    impl BollardEngine {
        pub fn connect() -> Result<Self, String> {
            let docker = Docker::connect_with_local_defaults()
                .map_err(|e| format!("failed to connect to docker daemon: {e}"))?;
            Ok(Self { docker })
        }
    }

    #[async_trait]
    impl ContainerEngine for BollardEngine {
        async fn create(&self, params: &ContainerParams) -> Result<String, String> {
            let mut port_bindings = HashMap::new();
            for port in &params.port_bindings {
                port_bindings.insert(
                    format!("{port}/tcp"),
                    Some(vec![PortBinding {
                        host_ip: Some("0.0.0.0".to_string()),
                        host_port: Some(port.to_string()),
                    }]),
                );
            }
            let binds = params
                .mounts
                .iter()
                .map(|(host, container, read_only)| {
                    let suffix = if *read_only { ":ro" } else { "" };
                    format!("{host}:{container}{suffix}")
                })
                .collect();

            let host_config = HostConfig {
                binds: Some(binds),
                port_bindings: Some(port_bindings),
                privileged: params.security_context.privileged,
                cap_add: Some(params.security_context.capabilities_add.clone()),
                cap_drop: Some(params.security_context.capabilities_drop.clone()),
                readonly_rootfs: params.security_context.read_only_root_filesystem,
                network_mode: params.network_namespace_of.as_ref().map(|c| format!("container:{c}")),
                memory: params.resources.memory_bytes.map(|b| b as i64),
                nano_cpus: params.resources.cpu_millis.map(|m| m as i64 * 1_000_000),
                ..Default::default()
            };
            let config = Config {
                image: Some(params.image.clone()),
                cmd: Some([params.command.clone(), params.args.clone()].concat()),
                user: params.security_context.run_as_user.map(|u| u.to_string()),
                host_config: Some(host_config),
                ..Default::default()
            };
            let options = CreateContainerOptions { name: params.name.clone(), platform: None };
            let response = self
                .docker
                .create_container(Some(options), config)
                .await
                .map_err(|e| format!("failed to create container {}: {e}", params.name))?;
            Ok(response.id)
        }

        async fn start(&self, container_id: &str) -> Result<(), String> {
            self.docker
                .start_container::<String>(container_id, None)
                .await
                .map_err(|e| format!("failed to start container {container_id}: {e}"))
        }

        async fn stop(&self, container_id: &str) -> Result<(), String> {
            self.docker
                .stop_container(container_id, None)
                .await
                .map_err(|e| format!("failed to stop container {container_id}: {e}"))
        }

        async fn remove(&self, container_id: &str) -> Result<(), String> {
            self.docker
                .remove_container(container_id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
                .await
                .map_err(|e| format!("failed to remove container {container_id}: {e}"))
        }

        async fn list_running(&self) -> Result<Vec<String>, String> {
            let containers = self
                .docker
                .list_containers::<String>(Some(ListContainersOptions {
                    all: false,
                    ..Default::default()
                }))
                .await
                .map_err(|e| format!("failed to list containers: {e}"))?;
            Ok(containers.into_iter().filter_map(|c| c.id).collect())
        }
    }
}
