//! Transfer-facing types: events in, signals out, and the seams the machine
//! consumes.

use std::sync::Arc;

use skiff_items::HandlerRegistry;
use skiff_protocol::Packet;

/// Which role this peer plays in the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// User-visible transfer lifecycle. Progresses monotonically toward one of
/// the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Connecting,
    InProgress,
    Succeeded,
    Failed,
}

/// Where in the packet sequence the transfer currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProtocolState {
    TransferHeader,
    ItemHeader,
    ItemContent,
    Finished,
}

/// Transport events pushed into the machine.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// The transport finished connecting. Primes a sending transfer.
    Connected,
    /// A whole packet arrived from the peer.
    PacketReceived(Packet),
    /// The transport is ready for the next outbound packet.
    PacketSent,
    /// The transport failed; the channel is no longer usable.
    TransportError(String),
}

/// Observable changes announced by the machine, in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSignal {
    StateChanged(TransferState),
    /// Integer percentage, emitted only when the value actually changes.
    ProgressChanged(u8),
    /// The peer's self-reported device name, from the transfer header.
    DeviceNameChanged(String),
    /// Terminal failure message; always precedes `StateChanged(Failed)`.
    ErrorChanged(String),
}

/// Outbound half of the transport, as seen by the machine.
///
/// Sends are fire-and-forget: delivery failures come back asynchronously as
/// [`TransferEvent::TransportError`]. `close` must be idempotent-safe to
/// call; the machine guarantees it invokes it exactly once per transfer.
pub trait PacketSink: Send {
    fn send_packet(&mut self, packet: Packet);
    fn close(&mut self);
}

/// Application-supplied context: the local device identity and the handler
/// registry consulted for incoming items.
#[derive(Clone)]
pub struct TransferContext {
    device_name: String,
    registry: Arc<HandlerRegistry>,
}

impl TransferContext {
    pub fn new(device_name: impl Into<String>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            device_name: device_name.into(),
            registry,
        }
    }

    /// The local device's self-reported name, sent in the transfer header.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }
}
