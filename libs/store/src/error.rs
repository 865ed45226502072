use thiserror::Error;

/// Failures surfaced by the KV store and message bus clients, independent of
/// which backend (in-memory or Redis) is behind them.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}: {1}")]
    Connection(String, #[source] redis::RedisError),

    #[error("{0}: {1}")]
    Backend(String, #[source] redis::RedisError),

    #[error("{0}: {1}")]
    Serialization(String, #[source] serde_json::Error),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("message bus topic '{0}' has no consumer group '{1}'")]
    UnknownGroup(String, String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
