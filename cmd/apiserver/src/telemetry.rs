use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Initializes the global tracing subscriber from a filter directive (e.g.
/// `"info,flotilla_apiserver=debug"`) and output format. No teacher
/// `telemetry.rs` was available to copy (`cmd/operator/src/main.rs` uses
/// `kaniop_operator::telemetry::init`, which ships OpenTelemetry trace export
/// this workspace has no exporter dependency for), so this stays a plain
/// `tracing-subscriber` setup.
pub fn init(log_filter: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_filter)?;
    let subscriber = fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
    Ok(())
}
