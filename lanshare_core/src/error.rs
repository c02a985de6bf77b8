//! Error taxonomy shared by the server handlers and the client

use crate::session::SessionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShareError {
    /// Bad or missing password
    #[error("Unauthorized: Incorrect or missing password")]
    Unauthorized,
    /// Unsafe filename, empty upload, malformed request
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    /// Network failure mid-transfer
    #[error("Transfer interrupted: {0}")]
    Transport(String),
    /// Filesystem read or write failure
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ShareError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) | Self::Transport(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
