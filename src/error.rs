use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[cfg(feature = "s3")]
use aws_sdk_s3::error::SdkError;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failures of the storage layer. Absence is never an error; see `Storage::get`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    #[error("invalid paste id: {0:?}")]
    InvalidId(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error")]
    IO {
        #[from]
        source: std::io::Error,
    },
    #[error("serialization error")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    #[cfg(feature = "s3")]
    #[error("S3 error")]
    S3 {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl StorageError {
    pub fn config(message: impl Into<String>) -> Self {
        StorageError::Config(message.into())
    }

    #[cfg(feature = "s3")]
    pub fn s3(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        StorageError::S3 {
            source: Box::new(source),
        }
    }
}

#[cfg(feature = "s3")]
impl<E, R> From<SdkError<E, R>> for StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    fn from(source: SdkError<E, R>) -> Self {
        StorageError::s3(source)
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("paste not found")]
    NotFound,
    #[error("paste content is required")]
    EmptyContent,
    #[error("language id is required")]
    MissingLanguage,
    #[error("could not allocate a paste id")]
    NoFreeId,
    #[error("storage error")]
    Storage {
        #[from]
        source: StorageError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::EmptyContent => StatusCode::BAD_REQUEST,
            ApiError::MissingLanguage => StatusCode::BAD_REQUEST,
            ApiError::NoFreeId => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage {
                source: StorageError::InvalidId(_),
            } => StatusCode::BAD_REQUEST,
            ApiError::Storage { source } => {
                error!("storage failure: {source:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status_code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
