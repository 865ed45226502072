use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::ObjectMeta;

/// Maps hostnames to `namespace/service-name` path strings resolved by the DNS
/// controller into proxy-reachable addresses (spec.md §4.5).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DnsSpec {
    pub host_mappings: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DnsStatus {
    pub resolved: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Dns {
    pub meta: ObjectMeta,
    pub spec: DnsSpec,
    #[serde(default)]
    pub status: DnsStatus,
}

impl Dns {
    pub fn new(meta: ObjectMeta, spec: DnsSpec) -> Self {
        Self {
            meta,
            spec,
            status: DnsStatus::default(),
        }
    }
}
