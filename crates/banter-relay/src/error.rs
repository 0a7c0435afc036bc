use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use banter_core::ErrorReply;

/// Failures the relay reports to its HTTP clients. Details stay in the server log.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("malformed request body: {0}")]
    BadRequest(#[from] JsonRejection),
    #[error("completion API failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
    #[error("rate limit exceeded")]
    RateLimited,
}

impl RelayError {
    fn status(&self) -> StatusCode {
        match self {
            RelayError::EmptyPrompt | RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            RelayError::EmptyPrompt | RelayError::BadRequest(_) => "Prompt is required",
            RelayError::Upstream(_) => "Server Error",
            RelayError::RateLimited => "Too many requests, please try again later.",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorReply {
            error: self.public_message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
