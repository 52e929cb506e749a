use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{RegisterRequest, UserProfile},
        errors::AuthError,
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_against_dummy, verify_password_blocking},
        policy::is_strong,
        repo::UserStore,
        repo_types::{NewUser, UserId},
    },
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration, login and profile maintenance against the credential store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.jwt.clone())
    }
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    /// Stores a new user with a hashed password. Uniqueness of username and
    /// email is left to the store's constraints.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserId, AuthError> {
        let username = req.username.trim().to_string();
        let email = normalize_email(&req.email);

        if username.is_empty() {
            return Err(AuthError::InvalidInput("username is required".into()));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidInput("invalid email".into()));
        }
        if !is_strong(&req.password) {
            warn!(%username, "registration with weak password");
            return Err(AuthError::WeakPassword);
        }

        let password_hash = hash_password_blocking(req.password).await?;
        let id = self
            .store
            .insert(NewUser {
                name: req.name.trim().to_string(),
                surname: req.surname.trim().to_string(),
                username: username.clone(),
                email,
                password_hash,
            })
            .await
            .map_err(|e| {
                warn!(%username, error = %e, "register failed");
                AuthError::from(e)
            })?;

        info!(user_id = %id, %username, "user registered");
        Ok(id)
    }

    /// Verifies credentials and issues a session token. Unknown user and wrong
    /// password both cost one hash verification.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let username = username.trim();
        let Some(user) = self.store.find_by_username(username).await? else {
            let plain = password.to_string();
            let _ = tokio::task::spawn_blocking(move || verify_against_dummy(&plain)).await;
            warn!(%username, "login unknown username");
            return Err(AuthError::UserNotFound);
        };

        let ok = verify_password_blocking(password.to_string(), user.password_hash).await?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .keys
            .issue(user.id)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or(AuthError::NotFound)
    }

    /// Overwrites name and surname. The caller's identity was already
    /// resolved by the authenticator; no further permission check happens.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        name: &str,
        surname: &str,
    ) -> Result<(), AuthError> {
        self.store
            .update_profile(user_id, name.trim(), surname.trim())
            .await?;
        info!(%user_id, "profile updated");
        Ok(())
    }
}
