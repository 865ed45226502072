//! Shared machinery for Flotilla's five resource controllers: a generic
//! poll-loop driver plus the metrics and backoff bookkeeping every controller
//! needs (spec.md §4). Grounded on `pando85-kaniop`'s `controller/mod.rs` and
//! `controller/context.rs`, with the watch-based reconcile driver replaced by
//! polling per spec.md's explicit design choice.

pub mod backoff;
pub mod error;
pub mod id;
pub mod metrics;
pub mod runner;

pub use backoff::BackoffCache;
pub use error::{ControllerError, Result};
pub use id::{ControllerId, DEFAULT_RECONCILE_INTERVAL};
pub use metrics::{ControllerMetrics, Metrics};
pub use runner::{run_poll_loop, ReconcileResult};
