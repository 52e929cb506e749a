use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::auth::repo_types::{NewUser, User, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username or email already registered")]
    UniqueViolation,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Credential store. Every operation is a single statement, atomic per row.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<UserId, StoreError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError>;
    /// Sets the new hash and clears both reset fields in one write, only while
    /// `reset_token` is still the stored token. Returns whether a row changed.
    async fn update_password_and_clear_reset(
        &self,
        id: UserId,
        reset_token: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError>;
    async fn update_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;
    async fn update_profile(&self, id: UserId, name: &str, surname: &str)
        -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str = "id, name, surname, username, email, password_hash, \
     password_reset_token, password_reset_expiration, created_at";

impl PgUserStore {
    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<UserId, StoreError> {
        let res = sqlx::query_scalar::<_, UserId>(
            r#"
            INSERT INTO users (name, surname, username, email, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.surname)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::UniqueViolation)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email", email).await
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.find_one("password_reset_token", token).await
    }

    async fn update_password_and_clear_reset(
        &self,
        id: UserId,
        reset_token: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $1,
                   password_reset_token = NULL,
                   password_reset_expiration = NULL
             WHERE id = $2 AND password_reset_token = $3
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .bind(reset_token)
        .execute(&self.db)
        .await
        .context("update password and clear reset token")?;
        Ok(res.rows_affected() == 1)
    }

    async fn update_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_reset_token = $1,
                   password_reset_expiration = $2
             WHERE id = $3
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(id)
        .execute(&self.db)
        .await
        .context("store reset token")?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        surname: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET name = $1, surname = $2 WHERE id = $3")
            .bind(name)
            .bind(surname)
            .bind(id)
            .execute(&self.db)
            .await
            .context("update profile")?;
        Ok(())
    }
}
