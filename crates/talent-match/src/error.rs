use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::hiring::router::error_response;
use crate::workflows::hiring::{ConsentStoreError, DirectoryError, PipelineError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Pipeline(PipelineError),
    /// Identity directory failed outside a pipeline operation, e.g. while registering PII.
    Directory(DirectoryError),
    /// Consent store failed outside a pipeline operation.
    Consent(ConsentStoreError),
    /// A candidate or job document did not parse.
    InvalidInput {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl AppError {
    pub fn invalid_input(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::InvalidInput {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Pipeline(err) => write!(f, "pipeline error: {}", err),
            AppError::Directory(err) => write!(f, "{}", err),
            AppError::Consent(err) => write!(f, "{}", err),
            AppError::InvalidInput { path, source } => {
                write!(f, "{} is not valid input: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Pipeline(err) => Some(err),
            AppError::Directory(err) => Some(err),
            AppError::Consent(err) => Some(err),
            AppError::InvalidInput { source, .. } => Some(source),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AppError::Pipeline(err) => return error_response(err),
            AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "invalid_input"),
            AppError::Directory(_) | AppError::Consent(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unavailable")
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = Json(json!({ "error": self.to_string(), "code": code }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl From<DirectoryError> for AppError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

impl From<ConsentStoreError> for AppError {
    fn from(value: ConsentStoreError) -> Self {
        Self::Consent(value)
    }
}
