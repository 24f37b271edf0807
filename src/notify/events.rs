use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserRegistered,
    PasswordResetRequested,
    OrderPlaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    UserRegistered {
        user_id: Uuid,
    },
    PasswordResetRequested {
        user_id: Uuid,
        key: String,
    },
    OrderPlaced {
        user_id: Uuid,
        order_id: Uuid,
        total_amount: i64,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::UserRegistered { .. } => EventKind::UserRegistered,
            DomainEvent::PasswordResetRequested { .. } => EventKind::PasswordResetRequested,
            DomainEvent::OrderPlaced { .. } => EventKind::OrderPlaced,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Typed publish/subscribe registry.
///
/// Handlers are registered per [`EventKind`] at start-up. `emit` runs every
/// handler subscribed to the event's kind; failures are logged and never
/// reach the caller.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    pub fn subscribers(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    pub async fn emit(&self, event: DomainEvent) {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(&kind) else {
            tracing::debug!(?kind, "no subscribers for event");
            return;
        };

        for handler in handlers {
            if let Err(err) = handler.handle(&event).await {
                tracing::warn!(
                    handler = handler.name(),
                    ?kind,
                    error = %err,
                    "event handler failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _event: &DomainEvent) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    #[tokio::test]
    async fn events_reach_only_their_subscribers() {
        let orders = Arc::new(Recorder::default());
        let users = Arc::new(Recorder::default());
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::OrderPlaced, orders.clone());
        bus.subscribe(EventKind::UserRegistered, users.clone());

        let user_id = Uuid::new_v4();
        bus.emit(DomainEvent::UserRegistered { user_id }).await;

        assert!(orders.seen.lock().unwrap().is_empty());
        assert_eq!(
            users.seen.lock().unwrap().as_slice(),
            &[DomainEvent::UserRegistered { user_id }]
        );
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_the_rest() {
        let recorder = Arc::new(Recorder::default());
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::OrderPlaced, Arc::new(Failing));
        bus.subscribe(EventKind::OrderPlaced, recorder.clone());

        bus.emit(DomainEvent::OrderPlaced {
            user_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            total_amount: 100,
        })
        .await;

        assert_eq!(bus.subscribers(EventKind::OrderPlaced), 2);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn emitting_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit(DomainEvent::PasswordResetRequested {
            user_id: Uuid::new_v4(),
            key: "k".into(),
        })
        .await;
        assert_eq!(bus.subscribers(EventKind::PasswordResetRequested), 0);
    }
}
