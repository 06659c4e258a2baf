use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub secret_key: String,
    pub access_token_lifetime_minutes: i64,
    pub confirmation_code_timeout_secs: i64,
    pub default_from_email: String,
    pub smtp: Option<SmtpConfig>,
    pub mail_rps: u32,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://yamdb.db?mode=rwc".to_string());

        let secret_key = std::env::var("SECRET_KEY").context("SECRET_KEY must be set")?;
        if secret_key.trim().is_empty() {
            anyhow::bail!("SECRET_KEY must not be empty");
        }

        let access_token_lifetime_minutes: i64 = std::env::var("ACCESS_TOKEN_LIFETIME_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24 * 60);

        let confirmation_code_timeout_secs: i64 = std::env::var("CONFIRMATION_CODE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3 * 86_400);

        let default_from_email = std::env::var("DEFAULT_FROM_EMAIL")
            .unwrap_or_else(|_| "noreply@yamdb.local".to_string());

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .context("SMTP_PORT")?,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            _ => None,
        };

        let mail_rps: u32 =
            std::env::var("MAIL_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(2);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            secret_key,
            access_token_lifetime_minutes,
            confirmation_code_timeout_secs,
            default_from_email,
            smtp,
            mail_rps,
        })
    }
}
