use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::auth::{errors::AuthError, extractors::AuthUser, jwt::JwtKeys};

/// Accepts exactly `Bearer <token>`: one space, two parts, case-sensitive scheme.
pub(crate) fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Guards the protected router. On success the caller's id is available to
/// handlers as [`AuthUser`].
pub async fn authenticate(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_bearer);

    let Some(token) = token else {
        warn!(path = %req.uri().path(), "missing or malformed bearer header");
        return Err(AuthError::MissingBearer);
    };

    let user_id = keys.verify(token).map_err(|e| {
        warn!(reason = ?e, path = %req.uri().path(), "session token rejected");
        AuthError::from(e)
    })?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
