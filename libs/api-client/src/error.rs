use thiserror::Error;

/// Errors from talking to the API server, distinguishing the four response
/// classes spec.md §7 defines (NotFound/Conflict/Validation/transient) from
/// plain transport failures.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}: {1}")]
    Http(String, #[source] reqwest::Error),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("api server returned {status}: {body}")]
    Unexpected { status: u16, body: String },

    #[error("{0}: {1}")]
    Serialization(String, #[source] serde_json::Error),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
