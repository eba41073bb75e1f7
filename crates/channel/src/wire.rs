//! TCP wire format for skiff packets.
//!
//! # Wire format
//!
//! ```text
//! PER PACKET:
//!   [4 bytes LE: payload_len]
//!   [1 byte: packet type (0=Success, 1=Error, 2=Json, 3=Binary)]
//!   [payload_len bytes: payload]
//! ```
//!
//! Frames longer than [`MAX_PACKET_SIZE`] are rejected before allocation.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use skiff_protocol::{MAX_PACKET_SIZE, Packet, PacketType};

use crate::ChannelError;

/// Writes one framed packet to the stream.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> Result<(), ChannelError> {
    let len = packet.payload.len();
    if len > MAX_PACKET_SIZE {
        return Err(ChannelError::Protocol(format!(
            "packet too large: {len} bytes (max {MAX_PACKET_SIZE})"
        )));
    }

    writer.write_u32_le(len as u32).await?;
    writer.write_u8(packet.packet_type.as_byte()).await?;
    writer.write_all(&packet.payload).await?;
    Ok(())
}

/// Reads one framed packet from the stream.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, ChannelError> {
    let len = reader.read_u32_le().await? as usize;
    if len > MAX_PACKET_SIZE {
        return Err(ChannelError::Protocol(format!(
            "packet too large: {len} bytes (max {MAX_PACKET_SIZE})"
        )));
    }

    let type_byte = reader.read_u8().await?;
    let packet_type =
        PacketType::from_byte(type_byte).map_err(|e| ChannelError::Protocol(e.to_string()))?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Packet {
        packet_type,
        payload,
    })
}
