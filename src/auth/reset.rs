use std::sync::Arc;

use axum::extract::FromRef;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{
    auth::{
        errors::AuthError,
        password::hash_password_blocking,
        policy::is_strong,
        repo::UserStore,
        reset_token::generate_reset_token,
        services::normalize_email,
    },
    mail::EmailSink,
    state::AppState,
};

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(15);
pub const RESET_EMAIL_SUBJECT: &str = "Password reset request";

fn reset_email_body(link: &str) -> String {
    format!(
        "We received a request to reset your password.\r\n\r\n\
         Follow this link within 15 minutes to choose a new one:\r\n{link}\r\n\r\n\
         If you did not ask for this, ignore this message.\r\n\r\n\
         The Taskgate team"
    )
}

/// Issues, persists, mails and consumes password-reset tokens.
///
/// A user's pending reset lives in `password_reset_token` and
/// `password_reset_expiration`. Issuing overwrites both, so only the newest
/// token is live. A successful confirmation clears both in the same write
/// that stores the new hash. Expired tokens are left in place and rejected
/// on read.
#[derive(Clone)]
pub struct PasswordResetFlow {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn EmailSink>,
    link_base: String,
}

impl FromRef<AppState> for PasswordResetFlow {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.mailer.clone(),
            state.config.reset_link_base(),
        )
    }
}

impl PasswordResetFlow {
    pub fn new(store: Arc<dyn UserStore>, mailer: Arc<dyn EmailSink>, link_base: String) -> Self {
        Self {
            store,
            mailer,
            link_base,
        }
    }

    pub async fn request_reset(&self, email: &str) -> Result<(), AuthError> {
        self.request_reset_at(email, OffsetDateTime::now_utc()).await
    }

    /// Persists a fresh token before mailing it. A delivery failure is
    /// reported but the stored token stays valid.
    pub async fn request_reset_at(&self, email: &str, now: OffsetDateTime) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let user = self.store.find_by_email(&email).await?.ok_or_else(|| {
            warn!(%email, "reset requested for unknown email");
            AuthError::EmailNotRegistered
        })?;

        let token = generate_reset_token().map_err(|e| {
            error!(error = %e, "os rng unavailable");
            AuthError::Internal(format!("reset token generation: {e}"))
        })?;
        let expires_at = now + RESET_TOKEN_TTL;
        self.store
            .update_reset_token(user.id, &token, expires_at)
            .await?;

        let link = format!("{}?token={}", self.link_base, token);
        self.mailer
            .send(&user.email, RESET_EMAIL_SUBJECT, &reset_email_body(&link))
            .await
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "reset email delivery failed");
                AuthError::EmailDeliveryFailed(e)
            })?;

        info!(user_id = %user.id, "password reset email sent");
        Ok(())
    }

    pub async fn confirm_reset(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.confirm_reset_at(token, new_password, OffsetDateTime::now_utc())
            .await
    }

    pub async fn confirm_reset_at(
        &self,
        token: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<(), AuthError> {
        if token.is_empty() || new_password.is_empty() {
            return Err(AuthError::InvalidInput("missing token or password".into()));
        }

        let user = self
            .store
            .find_by_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let Some(expires_at) = user.password_reset_expiration else {
            return Err(AuthError::InvalidToken);
        };
        if now >= expires_at {
            warn!(user_id = %user.id, "expired reset token presented");
            return Err(AuthError::TokenExpired);
        }

        if !is_strong(new_password) {
            return Err(AuthError::WeakPassword);
        }

        let hash = hash_password_blocking(new_password.to_string()).await?;
        let consumed = self
            .store
            .update_password_and_clear_reset(user.id, token, &hash)
            .await?;
        if !consumed {
            warn!(user_id = %user.id, "reset token consumed or replaced concurrently");
            return Err(AuthError::InvalidToken);
        }

        info!(user_id = %user.id, "password reset completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{
            password::verify_password,
            repo_types::{NewUser, UserId},
        },
        state::fakes::{token_from_body, FailingStore, MemoryStore, RecordingMailer},
    };
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-05-10 09:30:00 UTC);
    const NEW_PASSWORD: &str = "N3w!Password";

    struct Fixture {
        flow: PasswordResetFlow,
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        user_id: UserId,
    }

    async fn fixture(mailer: RecordingMailer) -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(mailer);
        let user_id = store
            .insert(NewUser {
                name: "Thor".into(),
                surname: "Odinson".into(),
                username: "thorbar".into(),
                email: "thor@example.com".into(),
                password_hash: crate::auth::password::hash_password("0ld!Password").unwrap(),
            })
            .await
            .unwrap();
        let flow = PasswordResetFlow::new(
            store.clone(),
            mailer.clone(),
            "http://localhost:5173/resetPasswordRequest".into(),
        );
        Fixture {
            flow,
            store,
            mailer,
            user_id,
        }
    }

    fn mailed_token(mailer: &RecordingMailer) -> String {
        let sent = mailer.sent();
        let (_, _, body) = sent.last().expect("an email was sent");
        token_from_body(body).expect("token in body")
    }

    #[tokio::test]
    async fn request_persists_token_and_mails_link() {
        let f = fixture(RecordingMailer::default()).await;
        f.flow.request_reset_at("Thor@example.com", T0).await.unwrap();

        let user = f.store.get(f.user_id).unwrap();
        let token = user.password_reset_token.clone().unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(user.password_reset_expiration, Some(T0 + Duration::minutes(15)));

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        let (to, subject, body) = &sent[0];
        assert_eq!(to, "thor@example.com");
        assert_eq!(subject, RESET_EMAIL_SUBJECT);
        assert!(body.contains(&format!(
            "http://localhost:5173/resetPasswordRequest?token={token}"
        )));
    }

    #[tokio::test]
    async fn unknown_email_is_reported() {
        let f = fixture(RecordingMailer::default()).await;
        let res = f.flow.request_reset_at("nobody@example.com", T0).await;
        assert!(matches!(res, Err(AuthError::EmailNotRegistered)));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn confirm_within_window_changes_password_and_clears_token() {
        let f = fixture(RecordingMailer::default()).await;
        f.flow.request_reset_at("thor@example.com", T0).await.unwrap();
        let token = mailed_token(&f.mailer);

        let just_before = T0 + Duration::minutes(15) - Duration::seconds(1);
        f.flow
            .confirm_reset_at(&token, NEW_PASSWORD, just_before)
            .await
            .unwrap();

        let user = f.store.get(f.user_id).unwrap();
        assert!(verify_password(NEW_PASSWORD, &user.password_hash).unwrap());
        assert!(user.password_reset_token.is_none());
        assert!(user.password_reset_expiration.is_none());
    }

    #[tokio::test]
    async fn token_expires_at_fifteen_minutes() {
        let f = fixture(RecordingMailer::default()).await;
        f.flow.request_reset_at("thor@example.com", T0).await.unwrap();
        let token = mailed_token(&f.mailer);

        let res = f
            .flow
            .confirm_reset_at(&token, NEW_PASSWORD, T0 + Duration::minutes(15))
            .await;
        assert!(matches!(res, Err(AuthError::TokenExpired)));

        // lazy invalidation: the stale token is still stored
        let user = f.store.get(f.user_id).unwrap();
        assert_eq!(user.password_reset_token.as_deref(), Some(token.as_str()));
        assert!(verify_password("0ld!Password", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn consumed_token_cannot_be_replayed() {
        let f = fixture(RecordingMailer::default()).await;
        f.flow.request_reset_at("thor@example.com", T0).await.unwrap();
        let token = mailed_token(&f.mailer);

        f.flow
            .confirm_reset_at(&token, NEW_PASSWORD, T0 + Duration::minutes(1))
            .await
            .unwrap();
        let replay = f
            .flow
            .confirm_reset_at(&token, "An0ther!Pass", T0 + Duration::minutes(2))
            .await;
        assert!(matches!(replay, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn new_request_supersedes_previous_token() {
        let f = fixture(RecordingMailer::default()).await;
        f.flow.request_reset_at("thor@example.com", T0).await.unwrap();
        let first = mailed_token(&f.mailer);
        f.flow
            .request_reset_at("thor@example.com", T0 + Duration::minutes(1))
            .await
            .unwrap();
        let second = mailed_token(&f.mailer);
        assert_ne!(first, second);

        let now = T0 + Duration::minutes(2);
        assert!(matches!(
            f.flow.confirm_reset_at(&first, NEW_PASSWORD, now).await,
            Err(AuthError::InvalidToken)
        ));
        f.flow
            .confirm_reset_at(&second, NEW_PASSWORD, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn weak_password_leaves_token_usable() {
        let f = fixture(RecordingMailer::default()).await;
        f.flow.request_reset_at("thor@example.com", T0).await.unwrap();
        let token = mailed_token(&f.mailer);
        let now = T0 + Duration::minutes(1);

        assert!(matches!(
            f.flow.confirm_reset_at(&token, "weakpass", now).await,
            Err(AuthError::WeakPassword)
        ));
        f.flow
            .confirm_reset_at(&token, NEW_PASSWORD, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_or_empty_token_is_rejected() {
        let f = fixture(RecordingMailer::default()).await;
        assert!(matches!(
            f.flow.confirm_reset_at("deadbeef", NEW_PASSWORD, T0).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            f.flow.confirm_reset_at("", NEW_PASSWORD, T0).await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_persisted_token() {
        let f = fixture(RecordingMailer::failing()).await;
        let res = f.flow.request_reset_at("thor@example.com", T0).await;
        assert!(matches!(res, Err(AuthError::EmailDeliveryFailed(_))));

        let token = f
            .store
            .get(f.user_id)
            .unwrap()
            .password_reset_token
            .expect("token persisted before delivery");
        f.flow
            .confirm_reset_at(&token, NEW_PASSWORD, T0 + Duration::minutes(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_requests_leave_one_pair() {
        let f = fixture(RecordingMailer::default()).await;
        let (a, b) = tokio::join!(
            f.flow.request_reset_at("thor@example.com", T0),
            f.flow.request_reset_at("thor@example.com", T0 + Duration::seconds(1)),
        );
        a.unwrap();
        b.unwrap();

        let mailed: Vec<String> = f
            .mailer
            .sent()
            .iter()
            .filter_map(|(_, _, body)| token_from_body(body))
            .collect();
        assert_eq!(mailed.len(), 2);

        let user = f.store.get(f.user_id).unwrap();
        let stored = user.password_reset_token.unwrap();
        assert!(mailed.contains(&stored));

        // the surviving token is the last one written, with its own expiry
        let writes = f.store.reset_writes();
        let (last_token, last_expiry) = writes.last().unwrap().clone();
        assert_eq!(stored, last_token);
        assert_eq!(user.password_reset_expiration, Some(last_expiry));
    }

    #[tokio::test]
    async fn concurrent_confirmations_consume_token_once() {
        let f = fixture(RecordingMailer::default()).await;
        f.flow.request_reset_at("thor@example.com", T0).await.unwrap();
        let token = mailed_token(&f.mailer);
        let now = T0 + Duration::minutes(1);

        let (a, b) = tokio::join!(
            f.flow.confirm_reset_at(&token, NEW_PASSWORD, now),
            f.flow.confirm_reset_at(&token, "An0ther!Pass", now),
        );
        assert!(matches!(
            (&a, &b),
            (Ok(()), Err(AuthError::InvalidToken)) | (Err(AuthError::InvalidToken), Ok(()))
        ));

        let user = f.store.get(f.user_id).unwrap();
        assert!(user.password_reset_token.is_none());
        let winner = if a.is_ok() { NEW_PASSWORD } else { "An0ther!Pass" };
        assert!(verify_password(winner, &user.password_hash).unwrap());
    }

    fn failing_flow() -> (PasswordResetFlow, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let flow = PasswordResetFlow::new(
            Arc::new(FailingStore),
            mailer.clone(),
            "http://localhost:5173/resetPasswordRequest".into(),
        );
        (flow, mailer)
    }

    #[tokio::test]
    async fn request_with_store_down_is_internal_and_sends_nothing() {
        let (flow, mailer) = failing_flow();
        let res = flow.request_reset_at("thor@example.com", T0).await;
        assert!(matches!(res, Err(AuthError::Internal(_))));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn confirm_with_store_down_is_internal() {
        let (flow, mailer) = failing_flow();
        let res = flow.confirm_reset_at("deadbeef", NEW_PASSWORD, T0).await;
        assert!(matches!(res, Err(AuthError::Internal(_))));
        assert!(mailer.sent().is_empty());
    }
}
