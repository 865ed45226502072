use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::ObjectMeta;
use crate::pod::PodSpec;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub spec: PodSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetSpec {
    pub selector: BTreeMap<String, String>,
    pub replicas: u32,
    pub template: PodTemplateSpec,
}

/// `observed_replicas` is the single scalar count decided in SPEC_FULL.md §9
/// (Open Question: ReplicaSet status shape) rather than separate ready/available
/// counters, since the control plane has no readiness-probe concept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetStatus {
    pub observed_replicas: u32,
    #[serde(default)]
    pub owned_pods: Vec<String>,
    #[serde(default)]
    pub hpa_controlled: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReplicaSet {
    pub meta: ObjectMeta,
    pub spec: ReplicaSetSpec,
    #[serde(default)]
    pub status: ReplicaSetStatus,
}

impl ReplicaSet {
    pub fn new(meta: ObjectMeta, spec: ReplicaSetSpec) -> Self {
        Self {
            meta,
            spec,
            status: ReplicaSetStatus::default(),
        }
    }
}
