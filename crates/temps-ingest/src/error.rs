//! Error taxonomy for the admission path

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use temps_core::problemdetails::{self, Problem};
use temps_core::QueueError;
use temps_payload_cache::CacheError;
use thiserror::Error;

use crate::credentials::CredentialStoreError;

/// Header carrying the public error message back to Sentry SDKs
pub const SENTRY_ERROR_HEADER: &str = "x-sentry-error";

#[derive(Error, Debug)]
pub enum IngestError {
    /// Missing, invalid, disabled or under-privileged credential. The reason
    /// is for server-side logs only and never reaches the client.
    #[error("Invalid api key")]
    Unauthenticated { reason: &'static str },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    MalformedRequest(String),

    #[error("Event payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Credential store unavailable")]
    CredentialStoreUnavailable(#[source] CredentialStoreError),

    #[error("Payload cache unavailable")]
    CacheUnavailable(#[source] CacheError),

    #[error("Failed to enqueue event for processing")]
    EnqueueFailure(#[source] QueueError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Terminal state an error leaves the admission flow in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request itself was refused; nothing was stored
    Rejected,
    /// Infrastructure failed while handling an acceptable request
    Failed,
}

impl IngestError {
    pub fn unauthenticated(reason: &'static str) -> Self {
        IngestError::Unauthenticated { reason }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        IngestError::MalformedRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            IngestError::Forbidden(_) => StatusCode::FORBIDDEN,
            IngestError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            IngestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::CredentialStoreUnavailable(_)
            | IngestError::CacheUnavailable(_)
            | IngestError::EnqueueFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::Unauthenticated { .. }
            | IngestError::Forbidden(_)
            | IngestError::MalformedRequest(_)
            | IngestError::PayloadTooLarge { .. } => FailureKind::Rejected,
            _ => FailureKind::Failed,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            IngestError::Unauthenticated { .. } => "Unauthorized",
            IngestError::Forbidden(_) => "Forbidden",
            IngestError::MalformedRequest(_) => "Bad Request",
            IngestError::PayloadTooLarge { .. } => "Payload Too Large",
            IngestError::CredentialStoreUnavailable(_)
            | IngestError::CacheUnavailable(_)
            | IngestError::EnqueueFailure(_) => "Service Unavailable",
            IngestError::Internal(_) => "Internal Error",
        }
    }
}

impl From<CacheError> for IngestError {
    fn from(error: CacheError) -> Self {
        IngestError::CacheUnavailable(error)
    }
}

impl From<QueueError> for IngestError {
    fn from(error: QueueError) -> Self {
        IngestError::EnqueueFailure(error)
    }
}

impl From<CredentialStoreError> for IngestError {
    fn from(error: CredentialStoreError) -> Self {
        IngestError::CredentialStoreUnavailable(error)
    }
}

impl From<IngestError> for Problem {
    fn from(error: IngestError) -> Self {
        let message = error.to_string();
        problemdetails::new(error.status_code())
            .with_title(error.title())
            .with_detail(message.clone())
            .with_header(SENTRY_ERROR_HEADER, &message)
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        Problem::from(self).into_response()
    }
}
