//! HTTP error handling
//!
//! Every handler error becomes a `{message, code}` JSON body; the status is
//! derived from the code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use knowledgetree_core::services::{ErrorKind, NodeServiceError};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(message, "INVALID_INPUT")
    }

    /// Log the real cause and hand the client a generic message
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "request failed");
        Self::new("Internal server error", "INTERNAL_ERROR")
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "NODE_NOT_FOUND" | "PATH_NOT_FOUND" | "PARENT_NOT_FOUND" => StatusCode::NOT_FOUND,
            "INVALID_INPUT" | "INVALID_OPERATION" | "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "JOB_RUNNING" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<NodeServiceError> for HttpError {
    fn from(err: NodeServiceError) -> Self {
        if err.kind() == ErrorKind::Internal {
            return Self::internal(err);
        }

        let code = match &err {
            NodeServiceError::NodeNotFound { .. } => "NODE_NOT_FOUND",
            NodeServiceError::PathNotFound { .. } => "PATH_NOT_FOUND",
            NodeServiceError::ParentNotFound { .. } => "PARENT_NOT_FOUND",
            NodeServiceError::ValidationFailed(_) => "VALIDATION_ERROR",
            _ => "INVALID_OPERATION",
        };
        Self::new(err.to_string(), code)
    }
}

impl From<ConfigError> for HttpError {
    fn from(err: ConfigError) -> Self {
        Self::internal(err)
    }
}
