mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, Router};
use clap::{crate_authors, crate_description, crate_version, Parser};
use flotilla_api_client::FlotillaClient;
use flotilla_controller_core::Metrics;
use flotilla_dns_controller::{HostsFileResolverSink, ResolverSink, SimulatedResolverSink};
use flotilla_pv_controller::{LocalStorageBackend, PvProvisionerConfig, StorageBackend};
use flotilla_store::{InMemoryMessageBus, MessageBus, RedisMessageBus};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "flotilla-controller-manager",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n")
)]
struct Args {
    /// Base URL of the API server every controller reconciles against.
    #[arg(long, default_value = "http://127.0.0.1:8080", env)]
    api_url: String,

    /// Message bus backend URL, consumed by the ServiceController's NodePort
    /// manager (the only controller that needs bus access directly).
    #[arg(long, default_value = "memory://", env)]
    bus_url: String,

    /// Poll interval override for the ReplicaSetController. Unset uses
    /// `flotilla_controller_core::DEFAULT_RECONCILE_INTERVAL`.
    #[arg(long, env)]
    replicaset_poll_interval_secs: Option<u64>,

    #[arg(long, env)]
    hpa_poll_interval_secs: Option<u64>,

    #[arg(long, env)]
    service_poll_interval_secs: Option<u64>,

    #[arg(long, env)]
    pv_poll_interval_secs: Option<u64>,

    #[arg(long, env)]
    dns_poll_interval_secs: Option<u64>,

    /// Root directory dynamically-provisioned `hostPath` PVs are created under.
    #[arg(long, default_value = "/var/lib/flotilla/volumes", env)]
    hostpath_root: String,

    /// Advertised NFS server host for `nfs`-backed dynamic provisioning.
    #[arg(long, default_value = "nfs.flotilla.internal", env)]
    nfs_server: String,

    /// Export root on the NFS server dynamic provisioning paths are rooted at.
    #[arg(long, default_value = "/export/flotilla", env)]
    nfs_export_root: String,

    /// Directory a local resolver (e.g. dnsmasq's `--hostsdir`) watches for
    /// per-record hosts fragments. Unset runs the DNSController against a
    /// simulated sink that only logs what it would publish.
    #[arg(long, env)]
    resolver_hostsdir: Option<String>,

    /// Listen on given port for /health and /metrics.
    #[arg(short, long, default_value_t = 8091, env)]
    port: u16,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`.
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env)]
    log_format: LogFormat,
}

#[derive(Clone)]
struct AppState {
    metrics: Arc<Metrics>,
}

async fn health() -> impl IntoResponse {
    Json("healthy")
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            "content-type",
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        state.metrics.encode(),
    )
}

async fn build_bus(url: &str) -> anyhow::Result<Arc<dyn MessageBus>> {
    if url.starts_with("redis://") {
        Ok(Arc::new(RedisMessageBus::connect(url, "controller-manager").await?))
    } else {
        Ok(Arc::new(InMemoryMessageBus::new()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let client = FlotillaClient::new(&args.api_url)?;
    let bus = build_bus(&args.bus_url).await?;

    let metrics = Arc::new(Metrics::new(&[
        flotilla_replicaset_controller::CONTROLLER_ID,
        flotilla_hpa_controller::CONTROLLER_ID,
        flotilla_service_controller::CONTROLLER_ID,
        flotilla_pv_controller::CONTROLLER_ID,
        flotilla_dns_controller::CONTROLLER_ID,
    ]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let replicaset_c = tokio::spawn(flotilla_replicaset_controller::run(
        client.clone(),
        metrics.controller(flotilla_replicaset_controller::CONTROLLER_ID),
        args.replicaset_poll_interval_secs.map(Duration::from_secs),
        shutdown_rx.clone(),
    ));

    let hpa_c = tokio::spawn(flotilla_hpa_controller::run(
        client.clone(),
        metrics.controller(flotilla_hpa_controller::CONTROLLER_ID),
        args.hpa_poll_interval_secs.map(Duration::from_secs),
        shutdown_rx.clone(),
    ));

    let service_c = tokio::spawn(flotilla_service_controller::run(
        client.clone(),
        bus,
        metrics.controller(flotilla_service_controller::CONTROLLER_ID),
        args.service_poll_interval_secs.map(Duration::from_secs),
        shutdown_rx.clone(),
    ));

    let pv_backend: Arc<dyn StorageBackend> = Arc::new(LocalStorageBackend);
    let pv_config = PvProvisionerConfig {
        hostpath_root: args.hostpath_root,
        nfs_server: args.nfs_server,
        nfs_export_root: args.nfs_export_root,
    };
    let pv_c = tokio::spawn(flotilla_pv_controller::run(
        client.clone(),
        pv_backend,
        pv_config,
        metrics.controller(flotilla_pv_controller::CONTROLLER_ID),
        args.pv_poll_interval_secs.map(Duration::from_secs),
        shutdown_rx.clone(),
    ));

    let resolver_sink: Arc<dyn ResolverSink> = match args.resolver_hostsdir {
        Some(directory) => Arc::new(HostsFileResolverSink::new(directory)),
        None => Arc::new(SimulatedResolverSink),
    };
    let dns_c = tokio::spawn(flotilla_dns_controller::run(
        client.clone(),
        resolver_sink,
        metrics.controller(flotilla_dns_controller::CONTROLLER_ID),
        args.dns_poll_interval_secs.map(Duration::from_secs),
        shutdown_rx,
    ));

    let state = AppState { metrics };
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));

    let (_, _, _, _, _, server_result) =
        tokio::join!(replicaset_c, hpa_c, service_c, pv_c, dns_c, server);
    server_result?;
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM signal handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
    let _ = shutdown_tx.send(true);
}
