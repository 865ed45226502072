use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("store error: {0}")]
    Store(#[from] flotilla_store::StoreError),

    #[error("model error: {0}")]
    Model(#[from] flotilla_model::ModelError),

    #[error("reconcile failed for {0}: {1}")]
    Reconcile(String, String),
}

pub type Result<T, E = ControllerError> = std::result::Result<T, E>;
