//! Domain events and the email notifications they trigger.

pub mod events;
pub mod handlers;
pub mod mailer;
pub mod worker;

use std::sync::Arc;

pub use events::{DomainEvent, EventBus, EventHandler, EventKind};
pub use mailer::{EmailJob, LogMailer, MailError, Mailer, SmtpMailer, mailer_from_config};
pub use worker::{DeadLetterStore, MailQueue, MailWorker, PgDeadLetterStore, RetryPolicy};

use crate::db::DbPool;
use handlers::{ConfirmationEmail, OrderPlacedEmail, Outbox, PasswordResetEmail};

/// Bus with the standard email handlers subscribed.
pub fn notification_bus(pool: DbPool, queue: MailQueue, from: &str) -> EventBus {
    let outbox = Outbox::new(pool, queue, from);
    let mut bus = EventBus::new();
    bus.subscribe(
        EventKind::UserRegistered,
        Arc::new(ConfirmationEmail(outbox.clone())),
    );
    bus.subscribe(
        EventKind::PasswordResetRequested,
        Arc::new(PasswordResetEmail(outbox.clone())),
    );
    bus.subscribe(EventKind::OrderPlaced, Arc::new(OrderPlacedEmail(outbox)));
    bus
}
