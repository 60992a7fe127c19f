//! Live push of persisted messages to the recipient's open connections.

use std::sync::Arc;

use parley_database::Message;
use tracing::{debug, warn};

use crate::events::ServerEvent;
use crate::registry::PresenceRegistry;

/// Outcome of one dispatch, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
}

#[derive(Debug, Clone)]
pub struct DeliveryDispatcher {
    registry: Arc<PresenceRegistry>,
}

impl DeliveryDispatcher {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Push `message` once to every live handle of its receiver.
    ///
    /// Per-handle failures are logged and swallowed. An offline receiver
    /// picks the message up from the store on their next fetch.
    pub fn dispatch(&self, message: &Message) -> DispatchReport {
        let handles = self.registry.handles_for(&message.receiver_id);
        if handles.is_empty() {
            debug!(message_id = message.id, receiver_id = %message.receiver_id, "receiver offline, not pushed");
            return DispatchReport::default();
        }

        let mut report = DispatchReport {
            attempted: handles.len(),
            delivered: 0,
        };

        for handle in &handles {
            match handle.push(ServerEvent::NewMessage {
                message: message.clone(),
            }) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(message_id = message.id, conn_id = %handle.id, %error, "message push failed");
                }
            }
        }

        debug!(
            message_id = message.id,
            receiver_id = %message.receiver_id,
            attempted = report.attempted,
            delivered = report.delivered,
            "message dispatched"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ConnectionHandle;
    use parley_database::{MessageContent, NewMessage};
    use tokio::sync::mpsc;

    fn message_to(receiver: &str) -> Message {
        NewMessage::new("alice", receiver, MessageContent::Text("hi".into())).into_message(1)
    }

    fn register(registry: &PresenceRegistry, user: &str, capacity: usize) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        registry.register(Arc::new(ConnectionHandle::new(user, tx)));
        rx
    }

    #[test]
    fn offline_receiver_gets_no_push() {
        let registry = Arc::new(PresenceRegistry::new());
        let dispatcher = DeliveryDispatcher::new(Arc::clone(&registry));

        assert_eq!(dispatcher.dispatch(&message_to("bob")), DispatchReport::default());
    }

    #[test]
    fn every_device_gets_one_push() {
        let registry = Arc::new(PresenceRegistry::new());
        let dispatcher = DeliveryDispatcher::new(Arc::clone(&registry));
        let mut phone = register(&registry, "bob", 8);
        let mut laptop = register(&registry, "bob", 8);
        let mut sender = register(&registry, "alice", 8);
        for rx in [&mut phone, &mut laptop, &mut sender] {
            while rx.try_recv().is_ok() {}
        }

        let message = message_to("bob");
        let report = dispatcher.dispatch(&message);

        assert_eq!(report, DispatchReport { attempted: 2, delivered: 2 });
        for rx in [&mut phone, &mut laptop] {
            assert_eq!(
                rx.try_recv().unwrap(),
                ServerEvent::NewMessage { message: message.clone() }
            );
            assert!(rx.try_recv().is_err());
        }
        assert!(sender.try_recv().is_err());
    }

    #[test]
    fn failing_handle_does_not_block_the_other() {
        let registry = Arc::new(PresenceRegistry::new());
        let dispatcher = DeliveryDispatcher::new(Arc::clone(&registry));
        let broken = register(&registry, "bob", 8);
        let mut healthy = register(&registry, "bob", 8);
        drop(broken);
        while healthy.try_recv().is_ok() {}

        let report = dispatcher.dispatch(&message_to("bob"));

        assert_eq!(report, DispatchReport { attempted: 2, delivered: 1 });
        assert!(matches!(healthy.try_recv(), Ok(ServerEvent::NewMessage { .. })));
    }
}
