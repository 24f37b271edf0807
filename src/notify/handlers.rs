use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    events::{DomainEvent, EventHandler},
    mailer::EmailJob,
    worker::MailQueue,
};
use crate::{db::DbPool, services::token_service};

/// Shared plumbing for handlers that turn an event into one email.
#[derive(Clone)]
pub struct Outbox {
    pool: DbPool,
    queue: MailQueue,
    from: String,
}

impl Outbox {
    pub fn new(pool: DbPool, queue: MailQueue, from: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            queue,
            from: from.into(),
        })
    }

    async fn recipient(&self, user_id: Uuid) -> anyhow::Result<String> {
        let row: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(email,)| email)
            .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))
    }

    fn push(&self, subject: String, body: String, to: String) -> anyhow::Result<()> {
        let job = EmailJob {
            subject,
            body,
            from: self.from.clone(),
            to,
        };
        if !self.queue.enqueue(job) {
            anyhow::bail!("mail queue rejected job");
        }
        Ok(())
    }
}

/// Issues (or reuses) the confirmation token and mails its key.
pub struct ConfirmationEmail(pub Arc<Outbox>);

#[async_trait]
impl EventHandler for ConfirmationEmail {
    fn name(&self) -> &'static str {
        "confirmation_email"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let DomainEvent::UserRegistered { user_id } = event else {
            return Ok(());
        };
        let token = token_service::issue(&self.0.pool, *user_id).await?;
        let to = self.0.recipient(*user_id).await?;
        self.0.push(
            format!("Email confirmation token for {to}"),
            token.key,
            to,
        )
    }
}

pub struct PasswordResetEmail(pub Arc<Outbox>);

#[async_trait]
impl EventHandler for PasswordResetEmail {
    fn name(&self) -> &'static str {
        "password_reset_email"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let DomainEvent::PasswordResetRequested { user_id, key } = event else {
            return Ok(());
        };
        let to = self.0.recipient(*user_id).await?;
        self.0
            .push(format!("Password reset token for {to}"), key.clone(), to)
    }
}

pub struct OrderPlacedEmail(pub Arc<Outbox>);

#[async_trait]
impl EventHandler for OrderPlacedEmail {
    fn name(&self) -> &'static str {
        "order_placed_email"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let DomainEvent::OrderPlaced {
            user_id,
            order_id,
            total_amount,
        } = event
        else {
            return Ok(());
        };
        let to = self.0.recipient(*user_id).await?;
        self.0.push(
            "Order status update".to_string(),
            format!("Order {order_id} has been placed. Total: {total_amount}"),
            to,
        )
    }
}
