use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{
    auth::{jwt::TokenError, password::PasswordError, repo::StoreError},
    mail::MailError,
};

/// Failures of the authentication and password-reset operations. Variants
/// stay distinct internally; [`IntoResponse`] decides what the client sees.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed bearer header")]
    MissingBearer,
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] TokenError),
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username or email already registered")]
    AlreadyExists,
    #[error("password does not meet strength requirements")]
    WeakPassword,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("reset token is invalid")]
    InvalidToken,
    #[error("reset token has expired")]
    TokenExpired,
    #[error("user no longer exists")]
    NotFound,
    #[error("email is not registered")]
    EmailNotRegistered,
    #[error("failed to deliver email: {0}")]
    EmailDeliveryFailed(#[from] MailError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation => AuthError::AlreadyExists,
            StoreError::Other(e) => AuthError::Internal(format!("{e:#}")),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingBearer
            | AuthError::Unauthorized(_)
            | AuthError::UserNotFound
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::AlreadyExists => StatusCode::CONFLICT,
            AuthError::WeakPassword | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound | AuthError::EmailNotRegistered => StatusCode::NOT_FOUND,
            AuthError::EmailDeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the client. Token failures collapse to one
    /// message, as do the two login failures.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::MissingBearer | AuthError::Unauthorized(_) => "unauthorized".into(),
            AuthError::UserNotFound | AuthError::InvalidCredentials => "login failed".into(),
            AuthError::AlreadyExists => "user already exists".into(),
            AuthError::WeakPassword => "password must be at least 8 characters and include \
                 uppercase, lowercase, digit and symbol"
                .into(),
            AuthError::InvalidInput(msg) => msg.clone(),
            AuthError::InvalidToken => "invalid reset token".into(),
            AuthError::TokenExpired => "reset token expired".into(),
            AuthError::NotFound => "user not found".into(),
            AuthError::EmailNotRegistered => "email not registered".into(),
            AuthError::EmailDeliveryFailed(_) => "failed to send reset email".into(),
            AuthError::Internal(_) => "internal error".into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
