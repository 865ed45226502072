use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Tcp
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    pub cpu_millis: Option<u32>,
    pub memory_bytes: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Binds a volume name used by `VolumeMount`s to a PersistentVolumeClaim in the
/// same namespace (spec.md §3, Pod.spec.volumes).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRef {
    pub name: String,
    pub claim_name: String,
}

/// Security settings that can be set at Pod level, Container level, or both.
/// Container-level fields win; unset container fields fall back to the Pod's,
/// per the merge rule in `original_source/pkg/config/containerConfig.py`
/// (SPEC_FULL.md §3).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    pub run_as_user: Option<u32>,
    pub run_as_group: Option<u32>,
    #[serde(default)]
    pub capabilities_add: Vec<String>,
    #[serde(default)]
    pub capabilities_drop: Vec<String>,
    pub read_only_root_filesystem: Option<bool>,
    pub privileged: Option<bool>,
    #[serde(default)]
    pub supplemental_groups: Vec<u32>,
}

impl SecurityContext {
    /// Merges a Pod-level and Container-level context: scalar fields take the
    /// container's value if set, else the pod's; capability/group lists union
    /// pod-then-container (duplicates dropped, order preserved).
    pub fn merge(pod: Option<&SecurityContext>, container: Option<&SecurityContext>) -> Self {
        let pod = pod.cloned().unwrap_or_default();
        let container = container.cloned().unwrap_or_default();

        let mut caps_add = pod.capabilities_add.clone();
        for c in container.capabilities_add {
            if !caps_add.contains(&c) {
                caps_add.push(c);
            }
        }
        let mut caps_drop = pod.capabilities_drop.clone();
        for c in container.capabilities_drop {
            if !caps_drop.contains(&c) {
                caps_drop.push(c);
            }
        }
        let mut groups = pod.supplemental_groups.clone();
        for g in container.supplemental_groups {
            if !groups.contains(&g) {
                groups.push(g);
            }
        }

        SecurityContext {
            run_as_user: container.run_as_user.or(pod.run_as_user),
            run_as_group: container.run_as_group.or(pod.run_as_group),
            capabilities_add: caps_add,
            capabilities_drop: caps_drop,
            read_only_root_filesystem: container
                .read_only_root_filesystem
                .or(pod.read_only_root_filesystem),
            privileged: container.privileged.or(pod.privileged),
            supplemental_groups: groups,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,
    pub security_context: Option<SecurityContext>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeRef>,
    #[serde(default)]
    pub node_selector: std::collections::BTreeMap<String, String>,
    pub security_context: Option<SecurityContext>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PodPhase {
    Creating,
    Running,
    Failed,
    Terminated,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    pub phase: Option<PodPhase>,
    pub subnet_ip: Option<String>,
    pub node_name: Option<String>,
    pub message: Option<String>,
    /// Scalar in `[0, 1]` reported by the node agent on each heartbeat; the only
    /// load signal this system has (spec.md §4.5 HPAController: "a pseudo-metric
    /// in this system"). `None` until the node agent reports one.
    pub load: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pod {
    pub meta: ObjectMeta,
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    pub fn new(meta: ObjectMeta, spec: PodSpec) -> Self {
        Self {
            meta,
            spec,
            status: PodStatus {
                phase: Some(PodPhase::Creating),
                ..Default::default()
            },
        }
    }

    /// Effective security context for a given container, after pod/container merge.
    pub fn effective_security_context(&self, container: &ContainerSpec) -> SecurityContext {
        SecurityContext::merge(
            self.spec.security_context.as_ref(),
            container.security_context.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_overrides_pod_scalars() {
        let pod_ctx = SecurityContext {
            run_as_user: Some(1000),
            privileged: Some(false),
            ..Default::default()
        };
        let container_ctx = SecurityContext {
            run_as_user: Some(2000),
            ..Default::default()
        };
        let merged = SecurityContext::merge(Some(&pod_ctx), Some(&container_ctx));
        assert_eq!(merged.run_as_user, Some(2000));
        assert_eq!(merged.privileged, Some(false));
    }

    #[test]
    fn capability_lists_union_without_duplicates() {
        let pod_ctx = SecurityContext {
            capabilities_add: vec!["NET_ADMIN".into()],
            ..Default::default()
        };
        let container_ctx = SecurityContext {
            capabilities_add: vec!["NET_ADMIN".into(), "SYS_TIME".into()],
            ..Default::default()
        };
        let merged = SecurityContext::merge(Some(&pod_ctx), Some(&container_ctx));
        assert_eq!(merged.capabilities_add, vec!["NET_ADMIN", "SYS_TIME"]);
    }

    #[test]
    fn missing_contexts_merge_to_default() {
        let merged = SecurityContext::merge(None, None);
        assert_eq!(merged, SecurityContext::default());
    }
}
