//! Error types for the container and the snapshot persistence helpers.

use modelx_types::ModelKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InjectError {
    /// A model constructor failed; the error is passed through untouched
    #[error(transparent)]
    Construction(#[from] anyhow::Error),

    #[error("Instance {key} is a {cached}, not a {requested}")]
    TypeMismatch {
        key: ModelKey,
        cached: &'static str,
        requested: &'static str,
    },
}

pub type InjectResult<T> = Result<T, InjectError>;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to access snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PersistResult<T> = Result<T, PersistError>;
