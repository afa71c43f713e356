//! Server error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use markpub_cloud::CloudError;
use markpub_store::StoreError;
use thiserror::Error;
use tracing::error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced by request handlers and service startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The notification carried no signature header.
    #[error("missing signature header")]
    MissingSignature,

    /// HMAC verification failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// A correctly signed notification whose body could not be parsed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing authorization code")]
    MissingCode,

    #[error("authorization failed: {0}")]
    OAuth(CloudError),

    #[error("account store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ServerError {
    /// HTTP status for this error.
    ///
    /// Signature failures are 403. A provider that rejects the authorization
    /// code is the caller's problem (400); any other provider failure is 502.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::InvalidPayload(_) | Self::MissingCode => StatusCode::BAD_REQUEST,
            Self::OAuth(CloudError::AuthFailed(_)) => StatusCode::BAD_REQUEST,
            Self::OAuth(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {self}");
        }

        // Bodies stay generic; details go to the log only.
        let body = match &self {
            Self::MissingSignature | Self::InvalidSignature => "Forbidden",
            Self::InvalidPayload(_) => "Invalid payload",
            Self::MissingCode => "Missing authorization code",
            Self::OAuth(_) => "Authorization failed",
            Self::Store(_) | Self::Config(_) => "Internal server error",
        };
        (status, body).into_response()
    }
}
