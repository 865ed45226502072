//! Shared object model for the Flotilla control plane: the `[MODULE]` types from
//! spec.md §3, plus the key/metadata scaffolding every kind is built on.

pub mod capacity;
pub mod dns;
pub mod error;
pub mod function;
pub mod hpa;
pub mod key;
pub mod meta;
pub mod node;
pub mod pod;
pub mod replicaset;
pub mod service;
pub mod volume;
pub mod workflow;

pub use capacity::{format_capacity, parse_capacity};
pub use dns::{Dns, DnsSpec, DnsStatus};
pub use error::{ModelError, Result};
pub use function::{Function, FunctionSpec, FunctionStatus};
pub use hpa::{HorizontalPodAutoscaler, HpaSpec, HpaStatus, HpaTargetRef, MetricThreshold};
pub use key::{Kind, ObjectKey};
pub use meta::ObjectMeta;
pub use node::{Node, NodeStatus};
pub use pod::{
    ContainerPort, ContainerSpec, Pod, PodPhase, PodSpec, PodStatus, Protocol,
    ResourceRequirements, SecurityContext, VolumeMount, VolumeRef,
};
pub use replicaset::{PodTemplateSpec, ReplicaSet, ReplicaSetSpec, ReplicaSetStatus};
pub use service::{Service, ServicePort, ServiceSpec, ServiceStatus, ServiceType};
pub use volume::{
    PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimStatus, PersistentVolumeSpec, PersistentVolumeStatus, PvBacking,
    PvPhase, PvcPhase, StorageClass,
};
pub use workflow::{Workflow, WorkflowSpec, WorkflowStep};
