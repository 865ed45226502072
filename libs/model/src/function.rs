use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    /// HTTP path the proxy routes invocations to, e.g. `/fn/resize-image`.
    pub trigger: String,
    /// Opaque reference (object-store URL or PV path) to the source archive
    /// the FaaS builder pulls before invoking the image build (spec.md §4.6).
    pub source_archive_ref: String,
}

/// `requests_since_tick` is a per-autoscaling-tick count, not a rate, per the
/// Open Question resolved in SPEC_FULL.md §9; the housekeeping loop resets it
/// to zero after each scaling decision.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    pub image: Option<String>,
    #[serde(default)]
    pub pod_names: Vec<String>,
    #[serde(default)]
    pub requests_since_tick: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub meta: ObjectMeta,
    pub spec: FunctionSpec,
    #[serde(default)]
    pub status: FunctionStatus,
}

impl Function {
    pub fn new(meta: ObjectMeta, spec: FunctionSpec) -> Self {
        Self {
            meta,
            spec,
            status: FunctionStatus::default(),
        }
    }
}
