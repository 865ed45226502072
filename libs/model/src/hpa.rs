use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HpaTargetRef {
    pub kind: String,
    pub name: String,
}

/// Scale-up past `high`, scale-down below `low`, both in `[0, 1]`
/// (SPEC_FULL.md §9: HPA metric is a normalized scalar, not a raw CPU figure).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricThreshold {
    pub high: f64,
    pub low: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HpaSpec {
    pub target: HpaTargetRef,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub metric: MetricThreshold,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HpaStatus {
    pub current_replicas: u32,
    pub last_scale_time: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HorizontalPodAutoscaler {
    pub meta: ObjectMeta,
    pub spec: HpaSpec,
    #[serde(default)]
    pub status: HpaStatus,
}

impl HorizontalPodAutoscaler {
    pub fn new(meta: ObjectMeta, spec: HpaSpec) -> Self {
        Self {
            meta,
            spec,
            status: HpaStatus::default(),
        }
    }
}
