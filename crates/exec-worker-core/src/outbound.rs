//! Fire-and-forget outbound channel from the worker to the host.

use tokio::sync::mpsc;

use crate::{envelope::Envelope, event::ExecEvent};

/// Sending half of the worker's outbound channel.
///
/// Envelopes sent from the same thread of execution reach the host in call
/// order; the channel is an unbounded FIFO with a single reader. Sends
/// never block and are never acknowledged.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl OutboundSender {
    /// Create the outbound channel, returning the sender and the receiving
    /// half a transport drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit a worker event to the host.
    pub fn send(&self, event: ExecEvent) {
        self.send_envelope(event.into());
    }

    /// Emit an already-built envelope to the host.
    pub fn send_envelope(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            tracing::debug!("outbound channel closed, dropping message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_send_order() {
        let (sender, mut rx) = OutboundSender::channel();
        sender.send(ExecEvent::Started {
            session_id: "s1".to_string(),
        });
        sender.send(ExecEvent::Success {
            session_id: "s1".to_string(),
        });

        assert_eq!(
            rx.try_recv().unwrap().msg_type,
            "exec-worker.exec-started"
        );
        assert_eq!(
            rx.try_recv().unwrap().msg_type,
            "exec-worker.exec-success"
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_is_silent_after_receiver_drops() {
        let (sender, rx) = OutboundSender::channel();
        drop(rx);
        sender.send(ExecEvent::Started {
            session_id: "s1".to_string(),
        });
    }
}
