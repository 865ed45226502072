use thiserror::Error;

/// Errors raised while constructing or validating a Flotilla object, independent of
/// any storage or transport concern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid capacity string: {0}")]
    InvalidCapacity(String),

    #[error("workflow graph is not acyclic: {0}")]
    CyclicGraph(String),
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
