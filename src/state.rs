use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{PgUserStore, UserStore},
    },
    config::AppConfig,
    mail::{EmailSink, LogMailer, SmtpMailer},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn EmailSink>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and picks the mail transport.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let mailer: Arc<dyn EmailSink> = match &config.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "smtp mailer configured");
                Arc::new(SmtpMailer::new(smtp).context("configure smtp mailer")?)
            }
            None => {
                warn!("SMTP_HOST not set; reset emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        Self::from_parts(Arc::new(config), Arc::new(PgUserStore::new(db)), mailer)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn EmailSink>,
    ) -> anyhow::Result<Self> {
        let jwt = JwtKeys::from_config(&config.jwt).context("load signing key")?;
        Ok(Self {
            config,
            jwt,
            store,
            mailer,
        })
    }
}
