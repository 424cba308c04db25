#![forbid(unsafe_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use taskhub_kernel_contracts::ContractViolation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("rejected: {0}")]
    Contract(#[from] ContractViolation),

    #[error("no unsubscribe challenge is open")]
    ChallengeNotOpen,

    #[error("challenge image could not be encoded: {0}")]
    Render(String),

    #[error("adapter runtime lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    reason: String,
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        let status = match self {
            AdapterError::Contract(_) => StatusCode::BAD_REQUEST,
            AdapterError::ChallengeNotOpen => StatusCode::CONFLICT,
            AdapterError::Config(_) | AdapterError::Render(_) | AdapterError::LockPoisoned => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            status: "error",
            reason: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
