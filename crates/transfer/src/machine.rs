//! The transfer state machine shared by both roles.

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use skiff_items::{Bundle, Item, OpenMode};
use skiff_protocol::headers::derive_item_type;
use skiff_protocol::{Packet, PacketType, TransferHeader};

use crate::state::{
    Direction, PacketSink, ProtocolState, TransferContext, TransferEvent, TransferSignal,
    TransferState,
};

/// A single transfer between two devices.
///
/// Construct with [`outgoing`](Transfer::outgoing) (bundle in hand, waits
/// for the transport to connect) or [`incoming`](Transfer::incoming)
/// (immediately in progress, items materialized through the context's
/// handler registry). Feed transport events through
/// [`handle_event`](Transfer::handle_event); observe changes through the
/// receiver returned by [`take_signals`](Transfer::take_signals).
pub struct Transfer {
    ctx: TransferContext,
    sink: Box<dyn PacketSink>,
    direction: Direction,
    state: TransferState,
    protocol_state: ProtocolState,

    /// Present only when sending; the receiver materializes items one at a
    /// time through the handler registry.
    bundle: Option<Bundle>,
    current_item: Option<Box<dyn Item>>,

    device_name: String,
    error: Option<String>,
    progress: u8,

    item_index: u64,
    item_count: u64,
    bytes_transferred: u64,
    bytes_total: u64,
    current_item_bytes_transferred: u64,
    current_item_bytes_total: u64,

    signals_tx: mpsc::UnboundedSender<TransferSignal>,
    signals_rx: Option<mpsc::UnboundedReceiver<TransferSignal>>,
    transport_closed: bool,
}

impl Transfer {
    /// Creates a sending transfer for `bundle`.
    ///
    /// The transfer starts in [`TransferState::Connecting`] and begins
    /// emitting packets when [`TransferEvent::Connected`] arrives.
    pub fn outgoing(ctx: TransferContext, sink: Box<dyn PacketSink>, bundle: Bundle) -> Self {
        let item_count = bundle.item_count();
        let bytes_total = bundle.total_size();
        Self::new(
            ctx,
            sink,
            Direction::Send,
            TransferState::Connecting,
            Some(bundle),
            item_count,
            bytes_total,
        )
    }

    /// Creates a receiving transfer. Item count and byte totals arrive with
    /// the peer's transfer header.
    pub fn incoming(ctx: TransferContext, sink: Box<dyn PacketSink>) -> Self {
        Self::new(
            ctx,
            sink,
            Direction::Receive,
            TransferState::InProgress,
            None,
            0,
            0,
        )
    }

    fn new(
        ctx: TransferContext,
        sink: Box<dyn PacketSink>,
        direction: Direction,
        state: TransferState,
        bundle: Option<Bundle>,
        item_count: u64,
        bytes_total: u64,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            sink,
            direction,
            state,
            protocol_state: ProtocolState::TransferHeader,
            bundle,
            current_item: None,
            device_name: String::new(),
            error: None,
            progress: 0,
            item_index: 0,
            item_count,
            bytes_transferred: 0,
            bytes_total,
            current_item_bytes_transferred: 0,
            current_item_bytes_total: 0,
            signals_tx,
            signals_rx: Some(signals_rx),
            transport_closed: false,
        }
    }

    /// Takes the signal receiver. Can only be called once.
    pub fn take_signals(&mut self) -> Option<mpsc::UnboundedReceiver<TransferSignal>> {
        self.signals_rx.take()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Integer progress percentage, `0..=100`.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// The peer's self-reported device name, once the transfer header has
    /// been received. Empty before that (and always empty when sending).
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The terminal failure message, if the transfer failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            TransferState::Succeeded | TransferState::Failed
        )
    }

    /// Cancels the transfer: a locally-initiated terminal error that also
    /// notifies the peer. A no-op once the transfer is finished.
    pub fn cancel(&mut self) {
        if self.is_finished() {
            return;
        }
        self.set_error("transfer cancelled".to_string(), true);
    }

    /// Feeds one transport event into the machine.
    ///
    /// Events arriving after a terminal state are ignored; failure paths do
    /// not re-emit.
    pub fn handle_event(&mut self, event: TransferEvent) {
        if self.is_finished() {
            return;
        }
        match event {
            TransferEvent::Connected => self.on_connected(),
            TransferEvent::PacketReceived(packet) => self.on_packet_received(packet),
            TransferEvent::PacketSent => self.on_packet_sent(),
            // The channel is already broken: tear down without echoing.
            TransferEvent::TransportError(message) => self.set_error(message, false),
        }
    }

    fn on_connected(&mut self) {
        // Only a sending transfer waits on the transport; the synthetic
        // first PacketSent pulls the transfer header out.
        if self.direction == Direction::Send && self.state == TransferState::Connecting {
            self.set_state(TransferState::InProgress);
            self.on_packet_sent();
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    fn on_packet_sent(&mut self) {
        if self.direction == Direction::Receive {
            return;
        }
        match self.protocol_state {
            ProtocolState::TransferHeader => self.send_transfer_header(),
            ProtocolState::ItemHeader => self.send_item_header(),
            ProtocolState::ItemContent => self.send_item_content(),
            // Waiting for the receiver's Success packet.
            ProtocolState::Finished => {}
        }
    }

    fn send_transfer_header(&mut self) {
        let header = TransferHeader {
            name: self.ctx.device_name().to_string(),
            count: self.item_count,
            size: self.bytes_total,
        };
        match Packet::json(&header) {
            Ok(packet) => self.sink.send_packet(packet),
            Err(e) => return self.set_error(format!("transfer header: {e}"), true),
        }
        debug!(
            items = self.item_count,
            bytes = self.bytes_total,
            "sent transfer header"
        );

        // An empty bundle is complete once the header is out; all that
        // remains is the receiver's acknowledgement.
        self.protocol_state = if self.item_count == 0 {
            ProtocolState::Finished
        } else {
            ProtocolState::ItemHeader
        };
    }

    fn send_item_header(&mut self) {
        let opened: Result<(Map<String, Value>, u64), String> = {
            let Some(bundle) = self.bundle.as_mut() else {
                return;
            };
            let Some(item) = bundle.item_mut(self.item_index) else {
                return;
            };
            match item.open(OpenMode::Read) {
                Ok(()) => Ok((item.properties(), item.size())),
                Err(_) => Err(format!("unable to open \"{}\" for reading", item.name())),
            }
        };

        let (properties, size) = match opened {
            Ok(opened) => opened,
            Err(message) => return self.set_error(message, true),
        };

        self.current_item_bytes_transferred = 0;
        self.current_item_bytes_total = size;

        match Packet::json(&properties) {
            Ok(packet) => self.sink.send_packet(packet),
            Err(e) => return self.set_error(format!("item header: {e}"), true),
        }

        // Zero-byte items consume no content packets.
        if size == 0 {
            self.advance_send();
        } else {
            self.protocol_state = ProtocolState::ItemContent;
        }
    }

    fn send_item_content(&mut self) {
        let chunk: Result<Vec<u8>, String> = {
            let Some(bundle) = self.bundle.as_mut() else {
                return;
            };
            let Some(item) = bundle.item_mut(self.item_index) else {
                return;
            };
            match item.read() {
                // An empty read before the item is drained would stall the
                // protocol; fail instead of looping.
                Ok(data) if data.is_empty() => Err(format!("unable to read \"{}\"", item.name())),
                Ok(data) => Ok(data),
                Err(e) => Err(format!("unable to read \"{}\": {e}", item.name())),
            }
        };

        let data = match chunk {
            Ok(data) => data,
            Err(message) => return self.set_error(message, true),
        };

        let len = data.len() as u64;
        self.sink.send_packet(Packet::binary(data));
        self.bytes_transferred += len;
        self.current_item_bytes_transferred += len;
        self.update_progress();

        if self.current_item_bytes_transferred >= self.current_item_bytes_total {
            self.advance_send();
        }
    }

    fn advance_send(&mut self) {
        if let Some(bundle) = self.bundle.as_mut()
            && let Some(item) = bundle.item_mut(self.item_index)
            && let Err(e) = item.close()
        {
            warn!(item = %item.name(), error = %e, "failed to close sent item");
        }
        self.item_index += 1;

        // The next PacketSent event drives the transition; nothing is sent
        // here.
        self.protocol_state = if self.item_index == self.item_count {
            ProtocolState::Finished
        } else {
            ProtocolState::ItemHeader
        };
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    fn on_packet_received(&mut self, packet: Packet) {
        // A peer-reported error is terminal at any time, in either role, and
        // is never echoed back.
        if packet.packet_type == PacketType::Error {
            self.set_error(packet.message(), false);
            return;
        }

        match self.direction {
            Direction::Send => {
                // The only packet a sender expects is the acknowledgement
                // that the receiver got everything.
                if self.protocol_state == ProtocolState::Finished
                    && packet.packet_type == PacketType::Success
                {
                    self.set_success(false);
                    return;
                }
            }
            Direction::Receive => match self.protocol_state {
                ProtocolState::TransferHeader => return self.process_transfer_header(&packet),
                ProtocolState::ItemHeader => return self.process_item_header(&packet),
                ProtocolState::ItemContent => return self.process_item_content(&packet),
                ProtocolState::Finished => return,
            },
        }

        self.set_error("protocol error - unexpected packet".to_string(), true);
    }

    fn process_transfer_header(&mut self, packet: &Packet) {
        let header: TransferHeader = match serde_json::from_slice(&packet.payload) {
            Ok(header) => header,
            Err(e) => return self.set_error(format!("transfer header: {e}"), true),
        };

        if !header.name.is_empty() {
            self.device_name = header.name.clone();
            self.emit(TransferSignal::DeviceNameChanged(header.name));
        }

        self.item_count = header.count;
        self.bytes_total = header.size;
        debug!(
            device = %self.device_name,
            items = self.item_count,
            bytes = self.bytes_total,
            "received transfer header"
        );

        // An empty bundle has nothing further on the wire; acknowledge it
        // right away.
        if self.item_count == 0 {
            self.set_success(true);
            return;
        }

        self.protocol_state = ProtocolState::ItemHeader;
    }

    fn process_item_header(&mut self, packet: &Packet) {
        let properties: Map<String, Value> = match serde_json::from_slice(&packet.payload) {
            Ok(properties) => properties,
            Err(e) => return self.set_error(format!("item header: {e}"), true),
        };

        let item_type = derive_item_type(&properties);
        let created: Result<Box<dyn Item>, String> = match self.ctx.registry().find(&item_type) {
            None => Err(format!("unrecognized item type \"{item_type}\"")),
            Some(handler) => handler
                .create_item(&item_type, &properties)
                .map_err(|e| format!("item header: {e}")),
        };

        let mut item = match created {
            Ok(item) => item,
            Err(message) => return self.set_error(message, true),
        };

        if item.open(OpenMode::Write).is_err() {
            let name = item.name().to_string();
            return self.set_error(format!("unable to open \"{name}\" for writing"), true);
        }

        self.current_item_bytes_transferred = 0;
        self.current_item_bytes_total = item.size();
        debug!(
            item = %item.name(),
            size = self.current_item_bytes_total,
            "receiving item"
        );
        self.current_item = Some(item);

        if self.current_item_bytes_total == 0 {
            self.advance_recv();
        } else {
            self.protocol_state = ProtocolState::ItemContent;
        }
    }

    fn process_item_content(&mut self, packet: &Packet) {
        let len = packet.payload.len() as u64;

        // Keep the byte counters honest: a chunk past the declared size
        // means the peers disagree about the item.
        if self.current_item_bytes_transferred + len > self.current_item_bytes_total {
            let name = self
                .current_item
                .as_ref()
                .map(|item| item.name().to_string())
                .unwrap_or_default();
            return self.set_error(
                format!("item content for \"{name}\" exceeds declared size"),
                true,
            );
        }

        let written: Result<(), String> = {
            let Some(item) = self.current_item.as_mut() else {
                return;
            };
            item.write(&packet.payload)
                .map_err(|e| format!("unable to write \"{}\": {e}", item.name()))
        };
        if let Err(message) = written {
            return self.set_error(message, true);
        }

        self.bytes_transferred += len;
        self.current_item_bytes_transferred += len;
        self.update_progress();

        if self.current_item_bytes_transferred >= self.current_item_bytes_total {
            self.advance_recv();
        }
    }

    fn advance_recv(&mut self) {
        if let Some(mut item) = self.current_item.take() {
            if let Err(e) = item.close() {
                warn!(item = %item.name(), error = %e, "failed to close received item");
            }
        }
        self.item_index += 1;

        if self.item_index == self.item_count {
            self.set_success(true);
        } else {
            self.protocol_state = ProtocolState::ItemHeader;
        }
    }

    // -----------------------------------------------------------------------
    // Progress and termination
    // -----------------------------------------------------------------------

    fn update_progress(&mut self) {
        let new_progress = if self.bytes_total > 0 {
            (self.bytes_transferred as u128 * 100 / self.bytes_total as u128) as u8
        } else {
            0
        };

        if new_progress != self.progress {
            self.progress = new_progress;
            self.emit(TransferSignal::ProgressChanged(new_progress));
        }
    }

    fn set_success(&mut self, send: bool) {
        if send {
            self.sink.send_packet(Packet::success());
        }
        info!(
            direction = ?self.direction,
            items = self.item_count,
            bytes = self.bytes_transferred,
            "transfer complete"
        );
        self.set_state(TransferState::Succeeded);
        self.protocol_state = ProtocolState::Finished;
        self.close_transport();
    }

    fn set_error(&mut self, message: String, send: bool) {
        error!(direction = ?self.direction, error = %message, "transfer failed");
        self.release_current_item();

        if send {
            self.sink.send_packet(Packet::error(message.clone()));
        }

        self.emit(TransferSignal::ErrorChanged(message.clone()));
        self.error = Some(message);
        self.set_state(TransferState::Failed);
        self.close_transport();
        self.protocol_state = ProtocolState::Finished;
    }

    /// The current item is a scoped resource: guaranteed closed on any exit,
    /// advance or failure.
    fn release_current_item(&mut self) {
        if let Some(mut item) = self.current_item.take() {
            if let Err(e) = item.close() {
                warn!(item = %item.name(), error = %e, "failed to close item");
            }
        }
        if self.direction == Direction::Send
            && let Some(bundle) = self.bundle.as_mut()
            && let Some(item) = bundle.item_mut(self.item_index)
            && let Err(e) = item.close()
        {
            warn!(item = %item.name(), error = %e, "failed to close item");
        }
    }

    fn set_state(&mut self, state: TransferState) {
        self.state = state;
        self.emit(TransferSignal::StateChanged(state));
    }

    fn close_transport(&mut self) {
        if !self.transport_closed {
            self.transport_closed = true;
            self.sink.close();
        }
    }

    fn emit(&self, signal: TransferSignal) {
        // The application may have dropped its receiver; signals are
        // best-effort.
        let _ = self.signals_tx.send(signal);
    }
}
