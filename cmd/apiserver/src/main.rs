mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, Router};
use clap::{crate_authors, crate_description, crate_version, Parser};
use flotilla_apiserver::{spawn_housekeeping, AppState, ApiServerConfig};
use flotilla_store::{InMemoryKvStore, InMemoryMessageBus, KvStore, MessageBus, RedisKvStore, RedisMessageBus};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "flotilla-apiserver",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n")
)]
struct Args {
    /// Listen on given port
    #[arg(short, long, default_value_t = 8080, env)]
    port: u16,

    /// KV store backend URL. `memory://` runs an in-process store (single
    /// replica only); `redis://host:port` connects to Redis.
    #[arg(long, default_value = "memory://", env)]
    kv_url: String,

    /// Message bus backend URL, same scheme convention as `--kv-url`.
    #[arg(long, default_value = "memory://", env)]
    bus_url: String,

    /// Seconds of silence before a node's heartbeat is considered stale.
    #[arg(long, default_value_t = 10, env)]
    node_timeout_secs: u64,

    /// Interval between node-liveness sweeps.
    #[arg(long, default_value_t = 5, env)]
    liveness_interval_secs: u64,

    /// Interval between Function autoscaling passes.
    #[arg(long, default_value_t = 15, env)]
    autoscale_interval_secs: u64,

    /// Scale a Function up when requests-per-pod-per-tick exceeds this.
    #[arg(long, default_value_t = 0.8, env)]
    autoscale_high_threshold: f64,

    /// Scale a Function down when requests-per-pod-per-tick falls below this.
    #[arg(long, default_value_t = 0.2, env)]
    autoscale_low_threshold: f64,

    /// Registry host Function images are pushed to.
    #[arg(long, default_value = "registry.flotilla.internal", env)]
    function_registry: String,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`.
    /// Example: "info,flotilla_apiserver=debug"
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env)]
    log_format: LogFormat,
}

async fn health() -> impl IntoResponse {
    Json("healthy")
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            "content-type",
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        state.metrics.encode(),
    )
}

async fn build_kv(url: &str) -> anyhow::Result<Arc<dyn KvStore>> {
    if url.starts_with("redis://") {
        Ok(Arc::new(RedisKvStore::connect(url).await?))
    } else {
        Ok(Arc::new(InMemoryKvStore::new()))
    }
}

async fn build_bus(url: &str) -> anyhow::Result<Arc<dyn MessageBus>> {
    if url.starts_with("redis://") {
        Ok(Arc::new(RedisMessageBus::connect(url, "apiserver").await?))
    } else {
        Ok(Arc::new(InMemoryMessageBus::new()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let kv = build_kv(&args.kv_url).await?;
    let bus = build_bus(&args.bus_url).await?;

    let config = ApiServerConfig {
        node_timeout: Duration::from_secs(args.node_timeout_secs),
        liveness_interval: Duration::from_secs(args.liveness_interval_secs),
        autoscale_interval: Duration::from_secs(args.autoscale_interval_secs),
        autoscale_high_threshold: args.autoscale_high_threshold,
        autoscale_low_threshold: args.autoscale_low_threshold,
        function_registry: args.function_registry,
    };

    let state = AppState::new(kv, bus, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (liveness, autoscale) = spawn_housekeeping(state.clone(), shutdown_rx);

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(flotilla_apiserver::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));

    let (_, _, server_result) = tokio::join!(liveness, autoscale, server);
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
