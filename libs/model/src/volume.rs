use serde::{Deserialize, Serialize};

use crate::key::ObjectKey;
use crate::meta::ObjectMeta;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StorageClass {
    HostPath,
    Nfs,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PvBacking {
    HostPath { path: String },
    Nfs { server: String, path: String },
}

impl PvBacking {
    pub fn storage_class(&self) -> StorageClass {
        match self {
            PvBacking::HostPath { .. } => StorageClass::HostPath,
            PvBacking::Nfs { .. } => StorageClass::Nfs,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PvPhase {
    /// Pre-declared by a user with no backing storage yet; the PVController's
    /// second pass materializes the path and flips it to `Available`
    /// (spec.md §3, §4.5 PVController).
    Static,
    Available,
    Bound,
    Released,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpec {
    pub capacity_bytes: u64,
    pub backing: PvBacking,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeStatus {
    pub phase: PvPhase,
    /// Set once a PVC is bound, per SPEC_FULL.md §9 (binding is explicit by
    /// `volume_name` only — no capacity/class-based auto-matching).
    pub claim_ref: Option<ObjectKey>,
}

impl Default for PersistentVolumeStatus {
    fn default() -> Self {
        Self {
            phase: PvPhase::Available,
            claim_ref: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PersistentVolume {
    pub meta: ObjectMeta,
    pub spec: PersistentVolumeSpec,
    #[serde(default)]
    pub status: PersistentVolumeStatus,
}

impl PersistentVolume {
    pub fn new(meta: ObjectMeta, spec: PersistentVolumeSpec) -> Self {
        Self {
            meta,
            spec,
            status: PersistentVolumeStatus::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PvcPhase {
    Pending,
    Bound,
    Lost,
    /// The named PV exists but is class- or capacity-incompatible (spec.md
    /// §4.5 PVController, §8 seed scenario).
    Failed,
}

impl Default for PvcPhase {
    fn default() -> Self {
        PvcPhase::Pending
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSpec {
    pub capacity_bytes: u64,
    pub storage_class: StorageClass,
    /// Explicit bind target by PV name. Required — PVC<->PV binding is never
    /// inferred from capacity or class (SPEC_FULL.md §9).
    pub volume_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimStatus {
    pub phase: PvcPhase,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PersistentVolumeClaim {
    pub meta: ObjectMeta,
    pub spec: PersistentVolumeClaimSpec,
    #[serde(default)]
    pub status: PersistentVolumeClaimStatus,
}

impl PersistentVolumeClaim {
    pub fn new(meta: ObjectMeta, spec: PersistentVolumeClaimSpec) -> Self {
        Self {
            meta,
            spec,
            status: PersistentVolumeClaimStatus::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backing_implies_storage_class() {
        let hp = PvBacking::HostPath {
            path: "/data".into(),
        };
        let nfs = PvBacking::Nfs {
            server: "10.0.0.5".into(),
            path: "/export".into(),
        };
        assert_eq!(hp.storage_class(), StorageClass::HostPath);
        assert_eq!(nfs.storage_class(), StorageClass::Nfs);
    }
}
