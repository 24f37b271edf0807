//! Deferred email delivery.
//!
//! Request handlers push [`EmailJob`]s onto a bounded [`MailQueue`]; a
//! [`MailWorker`] task drains it, retries transient failures with exponential
//! backoff and hands exhausted jobs to a [`DeadLetterStore`]. At most
//! `max_in_flight` deliveries run at once; past that the worker stops
//! receiving, the queue fills and further jobs are dropped.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
};

use super::mailer::{EmailJob, Mailer};
use crate::{config::MailConfig, db::DbPool};

#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::Sender<EmailJob>,
}

impl MailQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EmailJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. Returns false when the job was dropped.
    pub fn enqueue(&self, job: EmailJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(to = %job.to, subject = %job.subject, "mail queue full, email dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::error!(to = %job.to, "mail queue closed, email dropped");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn record(&self, job: &EmailJob, attempts: u32, error: &str) -> anyhow::Result<()>;
}

pub struct PgDeadLetterStore {
    pool: DbPool,
}

impl PgDeadLetterStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterStore for PgDeadLetterStore {
    async fn record(&self, job: &EmailJob, attempts: u32, error: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_dead_letters (subject, body, from_address, to_address, attempts, last_error)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&job.subject)
        .bind(&job.body)
        .bind(&job.from)
        .bind(&job.to)
        .bind(i32::try_from(attempts).unwrap_or(i32::MAX))
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    DeadLettered { attempts: u32 },
}

pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

pub struct MailWorker {
    mailer: Arc<dyn Mailer>,
    dead_letters: Arc<dyn DeadLetterStore>,
    policy: RetryPolicy,
    max_in_flight: usize,
}

impl MailWorker {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        dead_letters: Arc<dyn DeadLetterStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            mailer,
            dead_letters,
            policy,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run until every `MailQueue` handle is dropped, then wait for in-flight
    /// deliveries.
    pub async fn run(self, mut rx: mpsc::Receiver<EmailJob>) {
        tracing::info!("mail worker started");
        let slots = Arc::new(Semaphore::new(self.max_in_flight));
        let worker = Arc::new(self);
        let mut in_flight = JoinSet::new();

        loop {
            // wait for a free slot before taking the next job off the queue
            let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                break;
            };
            let Some(job) = rx.recv().await else {
                break;
            };
            let worker = Arc::clone(&worker);
            in_flight.spawn(async move {
                let _permit = permit;
                worker.deliver(&job).await
            });
            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        tracing::info!("mail channel closed, worker stopping");
    }

    pub async fn deliver(&self, job: &EmailJob) -> DeliveryOutcome {
        let mut attempt = 1;
        loop {
            let err = match self.mailer.send(job).await {
                Ok(()) => return DeliveryOutcome::Delivered { attempts: attempt },
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.policy.max_attempts {
                tracing::error!(
                    to = %job.to,
                    subject = %job.subject,
                    attempts = attempt,
                    error = %err,
                    "email delivery failed, moving to dead letters"
                );
                if let Err(store_err) = self
                    .dead_letters
                    .record(job, attempt, &err.to_string())
                    .await
                {
                    tracing::error!(error = %store_err, "failed to record dead letter");
                }
                return DeliveryOutcome::DeadLettered { attempts: attempt };
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(
                to = %job.to,
                attempt,
                delay_ms = %delay.as_millis(),
                error = %err,
                "email delivery failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
