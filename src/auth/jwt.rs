use axum::extract::FromRef;
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{claims::Claims, repo_types::UserId},
    config::JwtConfig,
    state::AppState,
};

/// Session lifetime. Fixed, not configurable.
pub const SESSION_TOKEN_TTL: Duration = Duration::hours(72);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret is not configured")]
    MissingSecret,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token identity claim is missing or not an integer")]
    ClaimMismatch,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// HS256 session token codec. Built once from configuration; the secret is
/// never read again from the environment.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    pub fn from_config(cfg: &JwtConfig) -> Result<Self, TokenError> {
        Self::new(&cfg.secret, SESSION_TOKEN_TTL)
    }

    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user_id: UserId, now: OffsetDateTime) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(%user_id, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Verifies signature and claims, then rejects when `now` is at or past `exp`.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<UserId, TokenError> {
        // Header problems must not be confused with claim type errors below.
        decode_header(token).map_err(|_| TokenError::Malformed)?;

        let data = decode::<Claims>(token, &self.decoding, &validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::Json(_) => TokenError::ClaimMismatch,
                _ => TokenError::Malformed,
            }
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims.user_id)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked against the caller's clock in `verify_at`, without leeway.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);
    validation
}
