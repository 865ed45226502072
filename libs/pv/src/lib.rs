//! PVController: binds `Pending` PersistentVolumeClaims to named
//! PersistentVolumes, dynamically provisioning backing storage when the
//! named PV does not yet exist, materializing pre-declared `static` PVs, and
//! releasing orphaned bindings (spec.md §4.5).

pub mod backend;
pub mod config;
pub mod controller;
pub mod reconcile;

pub use backend::{LocalStorageBackend, StorageBackend};
pub use config::PvProvisionerConfig;
pub use controller::{run, CONTROLLER_ID};
