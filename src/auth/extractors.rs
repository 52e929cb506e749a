use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Extensions},
};

use crate::auth::{errors::AuthError, repo_types::UserId};

/// Identity resolved by [`authenticate`](crate::auth::middleware::authenticate)
/// and stored in the request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl AuthUser {
    /// `None` when the request never went through the authenticator.
    pub fn from_extensions(extensions: &Extensions) -> Option<UserId> {
        extensions.get::<AuthUser>().map(|user| user.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_extensions(&parts.extensions)
            .map(AuthUser)
            .ok_or(AuthError::MissingBearer)
    }
}
