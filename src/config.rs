use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

/// Outbound SMTP settings. Absent when `SMTP_HOST` is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: Option<SmtpConfig>,
    pub public_url: String,
    pub public_port: Option<String>,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if secret.trim().is_empty() {
            bail!("JWT_SECRET is not set; refusing to issue unverifiable tokens");
        }
        let jwt = JwtConfig { secret };

        let smtp = match std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()) {
            Some(host) => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("MAIL_FROM").context("MAIL_FROM is required with SMTP_HOST")?,
            }),
            None => None,
        };

        Ok(Self {
            database_url,
            jwt,
            smtp,
            public_url: std::env::var("PUBLIC_API_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            public_port: std::env::var("PUBLIC_API_PORT").ok().filter(|p| !p.is_empty()),
            cors_origin: std::env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty()),
        })
    }

    /// Base of the link embedded in reset emails.
    pub fn reset_link_base(&self) -> String {
        let base = self.public_url.trim_end_matches('/');
        match &self.public_port {
            Some(port) => format!("{}:{}/resetPasswordRequest", base, port),
            None => format!("{}/resetPasswordRequest", base),
        }
    }
}
