//! TCP channel: read/write pumps feeding a transfer's event stream.

use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use skiff_protocol::Packet;
use skiff_transfer::{PacketSink, TransferEvent};

use crate::wire::{read_packet, write_packet};
use crate::{CHANNEL_BUFFER_SIZE, CONNECT_TIMEOUT, ChannelError};

/// Outbound half of a running channel; the transfer machine's
/// [`PacketSink`].
pub struct ChannelHandle {
    outgoing_tx: Option<mpsc::UnboundedSender<Packet>>,
}

impl PacketSink for ChannelHandle {
    fn send_packet(&mut self, packet: Packet) {
        if let Some(tx) = &self.outgoing_tx {
            let _ = tx.send(packet);
        }
    }

    /// Stops accepting outbound packets. The write pump drains whatever is
    /// already queued, then shuts the socket down, so a terminal Error or
    /// Success packet still reaches the peer.
    fn close(&mut self) {
        self.outgoing_tx = None;
    }
}

/// Connects to a listening peer and starts the pumps.
pub async fn connect(
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<(ChannelHandle, mpsc::Receiver<TransferEvent>), ChannelError> {
    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(ChannelError::Cancelled);
        }
        result = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)) => {
            match result {
                Ok(Ok(stream)) => {
                    info!(%addr, "packet channel connected");
                    stream
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ChannelError::Timeout),
            }
        }
    };

    Ok(from_stream(stream, cancel))
}

/// Accepts a single inbound connection and starts the pumps.
pub async fn accept(
    listener: &TcpListener,
    cancel: CancellationToken,
) -> Result<(ChannelHandle, mpsc::Receiver<TransferEvent>), ChannelError> {
    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(ChannelError::Cancelled);
        }
        result = listener.accept() => {
            let (stream, addr) = result?;
            info!(%addr, "packet channel connection accepted");
            stream
        }
    };

    Ok(from_stream(stream, cancel))
}

/// Wraps an already-connected stream in a packet channel.
///
/// The returned event stream starts with `Connected`, then carries one
/// `PacketReceived` per inbound frame and one `PacketSent` per completed
/// outbound write. A socket failure ends the stream with a single
/// `TransportError`.
pub fn from_stream(
    stream: TcpStream,
    cancel: CancellationToken,
) -> (ChannelHandle, mpsc::Receiver<TransferEvent>) {
    let (events_tx, events_rx) = mpsc::channel(64);
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

    // The channel is freshly created; this cannot fail.
    let _ = events_tx.try_send(TransferEvent::Connected);

    let (read_half, write_half) = stream.into_split();
    tokio::spawn(read_pump(read_half, events_tx.clone(), cancel));
    tokio::spawn(write_pump(write_half, outgoing_rx, events_tx));

    (
        ChannelHandle {
            outgoing_tx: Some(outgoing_tx),
        },
        events_rx,
    )
}

/// Decodes inbound frames into `PacketReceived` events.
async fn read_pump(
    read_half: OwnedReadHalf,
    events_tx: mpsc::Sender<TransferEvent>,
    cancel: CancellationToken,
) {
    let mut reader = BufReader::with_capacity(CHANNEL_BUFFER_SIZE, read_half);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = read_packet(&mut reader) => match result {
                Ok(packet) => {
                    if events_tx
                        .send(TransferEvent::PacketReceived(packet))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    debug!("packet read ended: {e}");
                    let _ = events_tx
                        .send(TransferEvent::TransportError(e.to_string()))
                        .await;
                    break;
                }
            },
        }
    }
}

/// Drains the outbound queue onto the socket, acknowledging each packet with
/// `PacketSent`.
///
/// Exits only when the queue closes, never on the cancel token: the machine
/// enqueues its terminal Error or Success packet immediately before closing
/// the handle, and that packet must still reach the peer.
async fn write_pump(
    write_half: OwnedWriteHalf,
    mut outgoing_rx: mpsc::UnboundedReceiver<Packet>,
    events_tx: mpsc::Sender<TransferEvent>,
) {
    let mut writer = BufWriter::with_capacity(CHANNEL_BUFFER_SIZE, write_half);

    while let Some(packet) = outgoing_rx.recv().await {
        let written = async {
            write_packet(&mut writer, &packet).await?;
            writer.flush().await?;
            Ok::<_, ChannelError>(())
        }
        .await;

        if let Err(e) = written {
            warn!("packet write error: {e}");
            let _ = events_tx
                .send(TransferEvent::TransportError(e.to_string()))
                .await;
            break;
        }
        if events_tx.send(TransferEvent::PacketSent).await.is_err() {
            break;
        }
    }

    let _ = writer.into_inner().shutdown().await;
}
