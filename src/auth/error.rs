use crate::auth::google::VerificationError;
use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Everything an authentication attempt can fail with. Each variant maps to
/// a specific status and client message; only `Verification` and `Unexpected`
/// hide their underlying cause from the client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("User already exists")]
    DuplicateEmail,
    #[error("This email is already linked to a different Google account")]
    DuplicateSubject,
    #[error("This email is registered with Google. Please sign in with Google.")]
    ProviderMismatch,
    #[error("Invalid password")]
    BadPassword,
    #[error("User not found with this email")]
    NotFound,
    #[error("Invalid Google token")]
    Verification(#[from] VerificationError),
    #[error("Something went wrong")]
    Unexpected(anyhow::Error),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Unexpected(err)
    }
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::Invalid(_)
            | AuthError::DuplicateEmail
            | AuthError::DuplicateSubject
            | AuthError::ProviderMismatch
            | AuthError::BadPassword => StatusCode::BAD_REQUEST,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Verification(_) => StatusCode::UNAUTHORIZED,
            AuthError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // The cause stays in the logs; the client sees the fixed message.
        match &self {
            AuthError::Verification(source) => {
                warn!(error = %source, "google token verification failed")
            }
            AuthError::Unexpected(source) => error!(error = %source, "auth operation failed"),
            _ => {}
        }
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
