use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub recipients: Vec<String>,
}

/// Outbound mail delivery. The caller does not wait for any reply beyond transport acceptance.
#[async_trait]
pub trait MailService: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, rps: u32) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Ok(Self { transport, limiter })
    }
}

#[async_trait]
impl MailService for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let mut builder =
            Message::builder().from(mail.sender.parse::<Mailbox>()?).subject(&mail.subject);
        for recipient in &mail.recipients {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        let message = builder.header(ContentType::TEXT_PLAIN).body(mail.body)?;

        self.limiter.until_ready().await;
        self.transport.send(message).await?;

        tracing::info!(recipients = mail.recipients.len(), subject = %mail.subject, "mail sent");
        Ok(())
    }
}

/// Development fallback used when no SMTP relay is configured.
pub struct LogMailer;

#[async_trait]
impl MailService for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = ?mail.recipients,
            from = %mail.sender,
            subject = %mail.subject,
            body = %mail.body,
            "mail (not delivered)"
        );
        Ok(())
    }
}

pub fn from_config(smtp: Option<&SmtpConfig>, rps: u32) -> Result<Arc<dyn MailService>, MailError> {
    match smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(smtp, rps)?)),
        None => {
            tracing::warn!("SMTP_HOST not set - confirmation codes are logged instead of mailed");
            Ok(Arc::new(LogMailer))
        }
    }
}
