//! HPAController: adjusts a ReplicaSet's desired replica count off the average
//! `load` reported by its owned Pods (spec.md §4.5). Grounded on the teacher's
//! `libs/group` controller/reconcile split, polling instead of watching.

pub mod controller;
pub mod reconcile;

pub use controller::{run, CONTROLLER_ID};
