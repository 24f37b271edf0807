//! Mail transports.
//!
//! [`SmtpMailer`] relays through an SMTP server with STARTTLS. [`LogMailer`]
//! stands in when no SMTP host is configured and only writes the message to
//! the log.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MailConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// A single deferred email delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("mail transport timed out")]
    Timeout,
}

impl MailError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MailError::Smtp(err) => !err.is_permanent(),
            MailError::Timeout => true,
            MailError::MessageBuild(_) | MailError::InvalidAddress(_) => false,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &EmailJob) -> Result<(), MailError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, config: &MailConfig) -> Result<Self, SmtpError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, job: &EmailJob) -> Result<(), MailError> {
        let message = build_message(job)?;
        match tokio::time::timeout(SEND_TIMEOUT, self.transport.send(message)).await {
            Ok(result) => {
                result?;
            }
            Err(_) => return Err(MailError::Timeout),
        }
        tracing::info!(to = %job.to, subject = %job.subject, "email sent");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, job: &EmailJob) -> Result<(), MailError> {
        build_message(job)?;
        tracing::info!(
            from = %job.from,
            to = %job.to,
            subject = %job.subject,
            body = %job.body,
            "email (log transport)"
        );
        Ok(())
    }
}

/// Pick the transport the configuration asks for.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, SmtpError> {
    match config.smtp_host.as_deref() {
        Some(host) => Ok(Arc::new(SmtpMailer::new(host, config)?)),
        None => {
            tracing::warn!("SMTP_HOST is not set, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

fn build_message(job: &EmailJob) -> Result<Message, MailError> {
    let message = Message::builder()
        .from(
            job.from
                .parse()
                .map_err(|_| MailError::InvalidAddress(job.from.clone()))?,
        )
        .to(job
            .to
            .parse()
            .map_err(|_| MailError::InvalidAddress(job.to.clone()))?)
        .subject(job.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(job.body.clone())?;
    Ok(message)
}
