pub mod dns;
pub mod functions;
pub mod hpas;
pub mod nodes;
pub mod pods;
pub mod replicasets;
pub mod services;
pub mod volumes;
pub mod workflows;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Mounts every domain route named in spec.md §6's route table onto a single
/// `Router<AppState>`. `cmd/apiserver` merges this with its own `/health` and
/// `/metrics` routes before binding a listener, mirroring the teacher's
/// `cmd/operator/src/main.rs` split between ambient routes (owned by the
/// binary) and domain routes (owned by the library).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/nodes", get(nodes::list_nodes))
        .route("/nodes/:name", put(nodes::register_or_heartbeat))
        .route("/nodes/:name/pods", get(nodes::node_pods))
        .route("/scheduler", post(pods::post_scheduler))
        .route(
            "/scheduler/namespaces/:namespace/pods/:name/nodes/:node",
            put(pods::bind_pod),
        )
        .route("/pods", get(pods::list_pods))
        .route(
            "/namespaces/:namespace/pods",
            get(pods::list_namespace_pods).post(pods::create_pod),
        )
        .route(
            "/namespaces/:namespace/pods/:name",
            get(pods::get_pod).put(pods::update_pod).delete(pods::delete_pod),
        )
        .route(
            "/namespaces/:namespace/pods/:name/status",
            get(pods::get_pod_status).put(pods::put_pod_status),
        )
        .route(
            "/namespaces/:namespace/pods/:name/ip",
            get(pods::get_pod_ip).patch(pods::patch_pod_ip),
        )
        .route("/replicasets", get(replicasets::list_all))
        .route(
            "/namespaces/:namespace/replicasets",
            get(replicasets::list_namespaced).post(replicasets::create),
        )
        .route(
            "/namespaces/:namespace/replicasets/:name",
            get(replicasets::get)
                .put(replicasets::update)
                .delete(replicasets::delete),
        )
        .route("/hpas", get(hpas::list_all))
        .route(
            "/namespaces/:namespace/hpas",
            get(hpas::list_namespaced).post(hpas::create),
        )
        .route(
            "/namespaces/:namespace/hpas/:name",
            get(hpas::get).put(hpas::update).delete(hpas::delete),
        )
        .route("/services", get(services::list_all))
        .route(
            "/namespaces/:namespace/services",
            get(services::list_namespaced).post(services::create),
        )
        .route(
            "/namespaces/:namespace/services/:name",
            get(services::get).put(services::update).delete(services::delete),
        )
        .route(
            "/namespaces/:namespace/services/:name/endpoints",
            get(services::get_endpoints),
        )
        .route("/dns", get(dns::list_all))
        .route(
            "/namespaces/:namespace/dns",
            get(dns::list_namespaced).post(dns::create),
        )
        .route(
            "/namespaces/:namespace/dns/:name",
            get(dns::get).put(dns::update).delete(dns::delete),
        )
        .route("/persistentvolumes", get(volumes::list_volumes).post(volumes::create_volume))
        .route(
            "/persistentvolumes/:name",
            get(volumes::get_volume)
                .put(volumes::update_volume)
                .delete(volumes::delete_volume),
        )
        .route("/persistentvolumeclaims", get(volumes::list_claims_all))
        .route(
            "/namespaces/:namespace/persistentvolumeclaims",
            get(volumes::list_claims_namespaced).post(volumes::create_claim),
        )
        .route(
            "/namespaces/:namespace/persistentvolumeclaims/:name",
            get(volumes::get_claim)
                .put(volumes::update_claim)
                .delete(volumes::delete_claim),
        )
        .route("/functions", get(functions::list_all))
        .route(
            "/namespaces/:namespace/functions",
            get(functions::list_namespaced).post(functions::create),
        )
        .route(
            "/namespaces/:namespace/functions/:name",
            get(functions::get)
                .put(functions::update)
                .delete(functions::delete)
                .patch(functions::invoke),
        )
        .route("/workflows", get(workflows::list_all))
        .route(
            "/namespaces/:namespace/workflows",
            get(workflows::list_namespaced).post(workflows::create),
        )
        .route(
            "/namespaces/:namespace/workflows/:name",
            get(workflows::get)
                .put(workflows::update)
                .delete(workflows::delete)
                .patch(workflows::invoke),
        )
}
