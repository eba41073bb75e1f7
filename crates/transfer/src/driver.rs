//! Async glue between a transport's event stream and the machine.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::machine::Transfer;
use crate::state::TransferEvent;

/// Feeds transport events into `transfer` until it reaches a terminal state.
///
/// Cancelling `cancel` turns into [`Transfer::cancel`], which notifies the
/// peer and fails the transfer locally. The event channel closing before the
/// transfer finishes counts as a transport failure.
pub async fn drive(
    transfer: &mut Transfer,
    events: &mut mpsc::Receiver<TransferEvent>,
    cancel: CancellationToken,
) {
    while !transfer.is_finished() {
        tokio::select! {
            _ = cancel.cancelled() => transfer.cancel(),
            event = events.recv() => match event {
                Some(event) => transfer.handle_event(event),
                None => transfer.handle_event(TransferEvent::TransportError(
                    "transport closed unexpectedly".into(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use skiff_items::{Bundle, HandlerRegistry};
    use skiff_protocol::Packet;

    use crate::state::{PacketSink, TransferContext, TransferState};

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<Packet>>>,
    }

    impl PacketSink for RecordingSink {
        fn send_packet(&mut self, packet: Packet) {
            self.sent.lock().unwrap().push(packet);
        }

        fn close(&mut self) {}
    }

    fn empty_receiver() -> (Transfer, RecordingSink) {
        let ctx = TransferContext::new("test", Arc::new(HandlerRegistry::new()));
        let sink = RecordingSink::default();
        let transfer = Transfer::incoming(ctx, Box::new(sink.clone()));
        (transfer, sink)
    }

    #[tokio::test]
    async fn drive_runs_until_terminal() {
        let (mut transfer, sink) = empty_receiver();
        let (events_tx, mut events_rx) = mpsc::channel(16);

        // A zero-item transfer header completes the receiver immediately.
        let th = serde_json::json!({"name": "peer", "count": "0", "size": "0"});
        events_tx
            .send(TransferEvent::PacketReceived(Packet::json(&th).unwrap()))
            .await
            .unwrap();

        drive(&mut transfer, &mut events_rx, CancellationToken::new()).await;

        assert_eq!(transfer.state(), TransferState::Succeeded);
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn drive_fails_on_channel_close() {
        let (mut transfer, _sink) = empty_receiver();
        let (events_tx, mut events_rx) = mpsc::channel::<TransferEvent>(16);
        drop(events_tx);

        drive(&mut transfer, &mut events_rx, CancellationToken::new()).await;

        assert_eq!(transfer.state(), TransferState::Failed);
        assert_eq!(transfer.error(), Some("transport closed unexpectedly"));
    }

    #[tokio::test]
    async fn drive_cancels_on_token() {
        let ctx = TransferContext::new("test", Arc::new(HandlerRegistry::new()));
        let sink = RecordingSink::default();
        let mut transfer = Transfer::outgoing(ctx, Box::new(sink.clone()), Bundle::new());
        let (_events_tx, mut events_rx) = mpsc::channel::<TransferEvent>(16);

        let cancel = CancellationToken::new();
        cancel.cancel();

        drive(&mut transfer, &mut events_rx, cancel).await;

        assert_eq!(transfer.state(), TransferState::Failed);
        assert_eq!(transfer.error(), Some("transfer cancelled"));
    }
}
