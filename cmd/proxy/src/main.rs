mod handlers;
mod metrics;
mod nat;
mod rules;
mod state;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, Router};
use clap::{crate_authors, crate_description, crate_version, Parser};
use flotilla_service_controller::ProxyMessage;
use flotilla_store::{InMemoryMessageBus, MessageBus, RedisMessageBus, TypedBus};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::interval;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics::ProxyMetrics;
use crate::nat::NatBackend;
use crate::state::ProxyState;
use crate::telemetry::LogFormat;

const PROXY_GROUP: &str = "proxy";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum NatBackendKind {
    Simulated,
    Iptables,
}

#[derive(Parser, Debug)]
#[command(
    name = "flotilla-proxy",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n")
)]
struct Args {
    /// This node's name; `node.<name>.services` is the topic consumed
    /// (spec.md §5 — derived the same way the node agent derives its Pod
    /// topic, no API call needed since the topic name is a pure function
    /// of the node name).
    #[arg(long, env)]
    node_name: String,

    /// Message bus backend URL.
    #[arg(long, default_value = "memory://", env)]
    bus_url: String,

    /// How often to poll this node's Service topic when it's empty.
    #[arg(long, default_value_t = 500, env)]
    poll_interval_ms: u64,

    /// Max pending messages pulled from the Service topic per poll.
    #[arg(long, default_value_t = 16, env)]
    batch_size: usize,

    /// Listen on given port for /health and /metrics.
    #[arg(short, long, default_value_t = 8093, env)]
    port: u16,

    /// NAT backend: `simulated` logs intended commands, `iptables` shells
    /// out to the real kernel facility (spec.md §4.4's "platforms lacking
    /// the kernel facility run in a no-op simulation mode").
    #[arg(long, value_enum, default_value_t = NatBackendKind::Simulated, env)]
    nat_backend: NatBackendKind,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`.
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env)]
    log_format: LogFormat,
}

#[derive(Clone)]
struct AppState {
    metrics: Arc<ProxyMetrics>,
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
        Ok(Arc::new(RedisMessageBus::connect(url, "proxy").await?))
    } else {
        Ok(Arc::new(InMemoryMessageBus::new()))
    }
}

fn build_nat(kind: NatBackendKind) -> Arc<dyn NatBackend> {
    match kind {
        NatBackendKind::Simulated => Arc::new(crate::nat::SimulatedNat),
        NatBackendKind::Iptables => Arc::new(crate::nat::IptablesNat::default()),
    }
}

/// Drains this node's Service topic every tick, dispatching each message and
/// acking unconditionally — a malformed or unprogrammable rule set is a
/// permanent failure the next CREATE/UPDATE for this Service will correct,
/// not a transient condition worth redelivering (spec.md §4.4, mirroring the
/// node agent's `run_pod_consumer` shape).
async fn run_service_consumer(
    state: Arc<ProxyState>,
    nat: Arc<dyn NatBackend>,
    metrics: Arc<ProxyMetrics>,
    bus: Arc<dyn MessageBus>,
    topic: String,
    poll_interval: Duration,
    batch_size: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let typed_bus = TypedBus::new(bus.as_ref());
    let mut ticker = interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("shutting down service consumer loop");
                    return;
                }
            }
        }

        let deliveries: Vec<(String, ProxyMessage)> = match typed_bus.poll(&topic, PROXY_GROUP, batch_size).await {
            Ok(deliveries) => deliveries,
            Err(error) => {
                error!(%error, "failed to poll service topic");
                continue;
            }
        };

        for (id, message) in deliveries {
            handlers::handle_message(&state, &nat, &metrics, message).await;
            if let Err(error) = typed_bus.ack(&topic, PROXY_GROUP, &id).await {
                error!(%error, delivery = %id, "failed to ack service message delivery");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let bus = build_bus(&args.bus_url).await?;
    let nat = build_nat(args.nat_backend);
    nat.ensure_base_chains().await.map_err(|e| anyhow::anyhow!(e))?;

    let service_topic = format!("node.{}.services", args.node_name);
    let state = Arc::new(ProxyState::new());
    let metrics = Arc::new(ProxyMetrics::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = tokio::spawn(run_service_consumer(
        state,
        nat,
        metrics.clone(),
        bus,
        service_topic,
        Duration::from_millis(args.poll_interval_ms),
        args.batch_size,
        shutdown_rx,
    ));

    let app_state = AppState { metrics };
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));

    let (_, server_result) = tokio::join!(consumer, server);
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
