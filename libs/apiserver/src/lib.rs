//! HTTP handlers, KV/bus wiring, and housekeeping loops for the Flotilla API
//! server (spec.md §4.1, §6). `cmd/apiserver` stays a thin wiring layer —
//! clap args, backend construction, `tokio::join!` — mirroring the teacher's
//! `cmd/operator` (thin) / `libs/operator` (substantial) split.

pub mod config;
pub mod crud;
pub mod error;
pub mod housekeeping;
pub mod routes;
pub mod state;
pub mod wire;

pub use config::ApiServerConfig;
pub use error::{ApiError, Result};
pub use routes::router;
pub use state::AppState;

use tokio::sync::watch;

/// Spawns both housekeeping loops against `state`, returning their join
/// handles so the caller can await them alongside the HTTP server in a single
/// `tokio::join!` (spec.md §4.1's two background loops).
pub fn spawn_housekeeping(
    state: AppState,
    shutdown: watch::Receiver<bool>,
) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
    let liveness = tokio::spawn(housekeeping::run_node_liveness(state.clone(), shutdown.clone()));
    let autoscale = tokio::spawn(housekeeping::run_function_autoscale(state, shutdown));
    (liveness, autoscale)
}
