//! ReplicaSetController: keeps each ReplicaSet's live owned Pod count equal to
//! `spec.replicas` (spec.md §4.5). Grounded on the teacher's `libs/group`
//! controller/reconcile split, with the watch-driven `kube::runtime::Controller`
//! replaced by `flotilla_controller_core::run_poll_loop`.

pub mod controller;
pub mod reconcile;

pub use controller::{run, CONTROLLER_ID};
