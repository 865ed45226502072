mod core;
mod metrics;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, Router};
use clap::{crate_authors, crate_description, crate_version, Parser};
use flotilla_api_client::FlotillaClient;
use flotilla_apiserver::routes::pods::{SCHEDULER_GROUP, SCHEDULER_TOPIC};
use flotilla_model::Pod;
use flotilla_store::{InMemoryMessageBus, MessageBus, RedisMessageBus, TypedBus};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::interval;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::schedule_one;
use crate::metrics::SchedulerMetrics;
use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "flotilla-scheduler",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n")
)]
struct Args {
    /// Base URL of the API server this scheduler binds Pods through.
    #[arg(long, default_value = "http://127.0.0.1:8080", env)]
    api_url: String,

    /// Message bus backend URL. `memory://` runs an in-process bus (only
    /// useful alongside an in-process apiserver in the same binary tree);
    /// `redis://host:port` connects to Redis.
    #[arg(long, default_value = "memory://", env)]
    bus_url: String,

    /// How often to poll the scheduler topic when it's empty.
    #[arg(long, default_value_t = 500, env)]
    poll_interval_ms: u64,

    /// Max pending Pods pulled from the scheduler topic per poll.
    #[arg(long, default_value_t = 16, env)]
    batch_size: usize,

    /// Listen on given port for /health and /metrics.
    #[arg(short, long, default_value_t = 8090, env)]
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
    metrics: Arc<SchedulerMetrics>,
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
        Ok(Arc::new(RedisMessageBus::connect(url, "scheduler").await?))
    } else {
        Ok(Arc::new(InMemoryMessageBus::new()))
    }
}

/// Drains the scheduler topic every tick, binding each pending Pod to a Node
/// and acking only on success or a swallowed not-found (spec.md §4.2:
/// "offsets committed only after successful bind").
async fn run_scheduler(
    client: FlotillaClient,
    bus: Arc<dyn MessageBus>,
    metrics: Arc<SchedulerMetrics>,
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
                    info!("shutting down scheduler loop");
                    return;
                }
            }
        }

        let deliveries: Vec<(String, Pod)> =
            match typed_bus.poll(SCHEDULER_TOPIC, SCHEDULER_GROUP, batch_size).await {
                Ok(deliveries) => deliveries,
                Err(error) => {
                    error!(%error, "failed to poll scheduler topic");
                    continue;
                }
            };

        for (id, pod) in deliveries {
            if schedule_one(&client, &metrics, &pod).await {
                if let Err(error) = typed_bus.ack(SCHEDULER_TOPIC, SCHEDULER_GROUP, &id).await {
                    error!(%error, delivery = %id, "failed to ack scheduler delivery");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let client = FlotillaClient::new(&args.api_url)?;
    let bus = build_bus(&args.bus_url).await?;
    let metrics = Arc::new(SchedulerMetrics::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = tokio::spawn(run_scheduler(
        client,
        bus,
        metrics.clone(),
        Duration::from_millis(args.poll_interval_ms),
        args.batch_size,
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

    let (_, server_result) = tokio::join!(scheduler, server);
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
