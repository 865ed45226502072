mod engine;
mod ipam;
mod metrics;
mod reconcile;
mod state;
mod sync;
mod telemetry;
mod volumes;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, Router};
use clap::{crate_authors, crate_description, crate_version, Parser};
use flotilla_api_client::FlotillaClient;
use flotilla_apiserver::wire::PodCommand;
use flotilla_model::Node;
use flotilla_store::{InMemoryMessageBus, MessageBus, RedisMessageBus, TypedBus};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::interval;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::engine::{ContainerEngine, SimulatedEngine};
use crate::metrics::AgentMetrics;
use crate::state::AgentState;
use crate::sync::{handle_command, AGENT_GROUP};
use crate::telemetry::LogFormat;
use crate::volumes::{NfsMount, VolumeResolver};

#[derive(Parser, Debug)]
#[command(
    name = "flotilla-agent",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n")
)]
struct Args {
    /// This node's name, used to derive the `node.<name>.pods` topic it
    /// consumes (spec.md §5).
    #[arg(long, env)]
    node_name: String,

    /// Address other components can reach this node at.
    #[arg(long, env)]
    advertised_address: String,

    /// Comma-separated `key=value` labels advertised on this node, matched
    /// against Pod `nodeSelector`s by the scheduler.
    #[arg(long, default_value = "", env)]
    labels: String,

    /// Base URL of the API server this agent registers/heartbeats/reports to.
    #[arg(long, default_value = "http://127.0.0.1:8080", env)]
    api_url: String,

    /// Message bus backend URL.
    #[arg(long, default_value = "memory://", env)]
    bus_url: String,

    /// How often to send a heartbeat to the API server.
    #[arg(long, default_value_t = 10, env)]
    heartbeat_interval_secs: u64,

    /// How often to poll this node's Pod topic when it's empty.
    #[arg(long, default_value_t = 500, env)]
    poll_interval_ms: u64,

    /// Max pending commands pulled from the Pod topic per poll.
    #[arg(long, default_value_t = 16, env)]
    batch_size: usize,

    /// How often to cross-check the engine's live containers against the
    /// local Pod table (spec.md §4.3).
    #[arg(long, default_value_t = 30, env)]
    reconcile_interval_secs: u64,

    /// Directory NFS-backed PV mounts are created under.
    #[arg(long, default_value = "/var/lib/flotilla/mounts", env)]
    mounts_root: PathBuf,

    /// Listen on given port for /health and /metrics.
    #[arg(short, long, default_value_t = 8092, env)]
    port: u16,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`.
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env)]
    log_format: LogFormat,
}

fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[derive(Clone)]
struct AppState {
    metrics: Arc<AgentMetrics>,
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
        Ok(Arc::new(RedisMessageBus::connect(url, "agent").await?))
    } else {
        Ok(Arc::new(InMemoryMessageBus::new()))
    }
}

fn build_engine() -> Box<dyn ContainerEngine> {
    #[cfg(feature = "docker")]
    {
        match crate::engine::BollardEngine::connect() {
            Ok(engine) => return Box::new(engine),
            Err(error) => {
                error!(%error, "failed to connect to docker daemon, falling back to simulated engine");
            }
        }
    }
    Box::new(SimulatedEngine::new())
}

/// Sends a heartbeat (re-registration, per `register_or_heartbeat_node`'s
/// doc comment: "same route serves both") on every tick until shutdown.
async fn run_heartbeat(client: FlotillaClient, mut node: Node, interval_secs: u64, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("shutting down heartbeat loop");
                    return;
                }
            }
        }
        match client.register_or_heartbeat_node(&node).await {
            Ok(updated) => node = updated,
            Err(error) => error!(%error, "failed to send heartbeat"),
        }
    }
}

/// Drains this node's Pod topic every tick, dispatching each command and
/// acking only on success (spec.md §5 redelivery design, same shape as the
/// scheduler's `run_scheduler`).
async fn run_pod_consumer(
    state: Arc<AgentState>,
    metrics: Arc<AgentMetrics>,
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
                    info!("shutting down pod consumer loop");
                    return;
                }
            }
        }

        let deliveries: Vec<(String, PodCommand)> = match typed_bus.poll(&topic, AGENT_GROUP, batch_size).await {
            Ok(deliveries) => deliveries,
            Err(error) => {
                error!(%error, "failed to poll pod topic");
                continue;
            }
        };

        for (id, command) in deliveries {
            if handle_command(&state, &metrics, command).await {
                if let Err(error) = typed_bus.ack(&topic, AGENT_GROUP, &id).await {
                    error!(%error, delivery = %id, "failed to ack pod command delivery");
                }
            }
        }
    }
}

async fn run_reconcile_loop(
    state: Arc<AgentState>,
    metrics: Arc<AgentMetrics>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("shutting down reconcile loop");
                    return;
                }
            }
        }
        reconcile::reconcile_once(&state, &metrics).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let client = FlotillaClient::new(&args.api_url)?;
    let bus = build_bus(&args.bus_url).await?;

    let node = Node::new(args.node_name.clone(), args.advertised_address.clone(), parse_labels(&args.labels));
    let node = client.register_or_heartbeat_node(&node).await?;
    let pod_topic = node.pod_topic.clone();

    let engine = build_engine();
    let mount_backend = Box::new(NfsMount { mounts_root: args.mounts_root.clone() });
    let volume_resolver = VolumeResolver::new(client.clone(), mount_backend, args.mounts_root.clone());
    let state = Arc::new(AgentState::new(client.clone(), engine, volume_resolver, args.node_name.clone()));
    let metrics = Arc::new(AgentMetrics::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let heartbeat = tokio::spawn(run_heartbeat(
        client.clone(),
        node,
        args.heartbeat_interval_secs,
        shutdown_rx.clone(),
    ));

    let consumer = tokio::spawn(run_pod_consumer(
        state.clone(),
        metrics.clone(),
        bus,
        pod_topic,
        Duration::from_millis(args.poll_interval_ms),
        args.batch_size,
        shutdown_rx.clone(),
    ));

    let reconciler = tokio::spawn(run_reconcile_loop(
        state,
        metrics.clone(),
        args.reconcile_interval_secs,
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

    let (_, _, _, server_result) = tokio::join!(heartbeat, consumer, reconciler, server);
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
