//! Error types shared across the `greenroom` components.
//!
//! Each seam has its own enum: ingestion errors carry their HTTP mapping,
//! notifier errors describe subscription conflicts, compositor errors cover
//! frame and background media, and client errors cover the HTTP consumer and
//! producer. Delivery loss is not represented here: the
//! notifier logs it and moves on.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures of the ingestion endpoint.
#[derive(Debug, Error)]
pub enum IngestError {
    /// `text` missing, null or empty.
    #[error("Text is required")]
    Validation,

    /// The body could not be read as a submission.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    /// Anything unexpected while handling the request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::Validation => {
                (StatusCode::BAD_REQUEST, IngestError::Validation.to_string()).into_response()
            }
            IngestError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request body" })),
            )
                .into_response(),
            IngestError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to process request" })),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotifierError {
    #[error("A subscriber is already connected")]
    AlreadySubscribed,
}

impl IntoResponse for NotifierError {
    fn into_response(self) -> Response {
        (
            StatusCode::CONFLICT,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Error)]
pub enum CompositorError {
    /// Source video or background not decodable yet. Retried next frame.
    #[error("media not ready")]
    MediaNotReady,

    #[error("frame {width}x{height} expects {expected} bytes of RGBA, got {len}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        len: usize,
    },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to fetch background: {0}")]
    Fetch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures reported by an avatar session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Avatar API not initialized")]
    NotStarted,

    #[error("{0}")]
    Sdk(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("server rejected request with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode event payload: {0}")]
    Decode(#[from] serde_json::Error),
}
