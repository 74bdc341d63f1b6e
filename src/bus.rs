use tokio::sync::{broadcast, mpsc};

use crate::core::Envelope;

/// Capacity of the publish side of the bus.
const PUBLISH_CAPACITY: usize = 256;

/// In-process message bus.
///
/// Messages travel in two directions: producers dispatch envelopes towards
/// the engine inbox, and the engine publishes envelopes that are fanned out
/// to every subscriber. The engine is the only inbox consumer.
pub struct Bus {
    inbox_tx: mpsc::UnboundedSender<Envelope>,
    inbox_rx: mpsc::UnboundedReceiver<Envelope>,
    publish_tx: broadcast::Sender<Envelope>,
}

impl Bus {
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (publish_tx, _) = broadcast::channel(PUBLISH_CAPACITY);

        Self {
            inbox_tx,
            inbox_rx,
            publish_tx,
        }
    }

    /// Handle for producers and subscribers.
    pub fn handle(&self) -> BusHandle {
        BusHandle {
            inbox: self.inbox_tx.clone(),
            publish: self.publish_tx.clone(),
        }
    }

    /// Take the engine side of the bus.
    pub fn split(self) -> (mpsc::UnboundedReceiver<Envelope>, BusHandle) {
        let handle = self.handle();
        (self.inbox_rx, handle)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable access to the bus.
#[derive(Clone)]
pub struct BusHandle {
    inbox: mpsc::UnboundedSender<Envelope>,
    publish: broadcast::Sender<Envelope>,
}

impl BusHandle {
    /// Deliver an envelope to the engine.
    pub fn dispatch(&self, envelope: Envelope) {
        if self.inbox.send(envelope).is_err() {
            log::warn!("Engine inbox is gone, dropping message");
        }
    }

    /// Fan an engine-published envelope out to all subscribers.
    pub fn publish(&self, envelope: Envelope) {
        // A send error only means nobody is listening right now.
        if self.publish.send(envelope).is_err() {
            log::trace!("No bus subscribers");
        }
    }

    /// Observe everything the engine publishes.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.publish.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LoggingControl, LoggingOp, Message};

    fn envelope() -> Envelope {
        Envelope::broadcast(
            1,
            1,
            0.0,
            Message::LoggingControl(LoggingControl {
                op: LoggingOp::RequestStart,
                name: "p1".to_owned(),
            }),
        )
    }

    #[test]
    fn dispatch_reaches_inbox() {
        let bus = Bus::new();
        let handle = bus.handle();
        let (mut inbox, _) = bus.split();

        handle.dispatch(envelope());

        assert_eq!(inbox.try_recv().unwrap(), envelope());
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = Bus::new();
        let handle = bus.handle();

        let mut first = handle.subscribe();
        let mut second = handle.subscribe();

        handle.publish(envelope());

        assert_eq!(first.try_recv().unwrap(), envelope());
        assert_eq!(second.try_recv().unwrap(), envelope());
    }
}
