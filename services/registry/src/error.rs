use axum::http::StatusCode;
use thiserror::Error;

/// Failures surfaced by the patient service.
///
/// Every variant maps to exactly one HTTP status at the dispatch boundary;
/// the message is what the caller sees in the `error` field.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotSupported(String),

    #[error("{0:#}")]
    Store(anyhow::Error),

    #[error("{0:#}")]
    Authorization(anyhow::Error),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl RegistryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            RegistryError::Store(_)
            | RegistryError::Authorization(_)
            | RegistryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
