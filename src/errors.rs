use crate::geo::DecodeError;
use crate::vector::{RecommendError, ServiceError};

/// Errors surfaced to HTTP clients.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid polyline: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Recommend(#[from] RecommendError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

/// How an error should be reported to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Decode(_) | AppError::Invalid(_) => ErrorKind::BadRequest,
            AppError::Recommend(RecommendError::Index(_)) => ErrorKind::BadRequest,
            AppError::Recommend(RecommendError::UnknownUser(_)) => ErrorKind::NotFound,
            AppError::Recommend(RecommendError::Service(e)) | AppError::Service(e) => {
                service_kind(e)
            }
            AppError::Other(_) => ErrorKind::Internal,
        }
    }
}

fn service_kind(err: &ServiceError) -> ErrorKind {
    match err {
        ServiceError::Index(_) => ErrorKind::BadRequest,
        ServiceError::UnknownIndex(_) => ErrorKind::NotFound,
        ServiceError::Storage(_) | ServiceError::NotPersistent(_) | ServiceError::Internal(_) => {
            ErrorKind::Internal
        }
    }
}
