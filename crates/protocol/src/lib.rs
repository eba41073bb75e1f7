//! Wire protocol types for skiff transfers.
//!
//! A transfer interleaves two sub-protocols over one packet stream: a JSON
//! control sub-protocol (the transfer header and one header per item) and an
//! opaque binary content sub-protocol (item data chunks). This crate defines
//! the typed [`Packet`] envelope shared by both, the JSON header schema, and
//! the legacy compatibility rules for item headers.

pub mod headers;
pub mod packet;

pub use headers::TransferHeader;
pub use packet::{Packet, PacketType};

/// Largest accepted packet payload (16 MiB).
///
/// Senders chunk item content well below this; the cap bounds allocation
/// when decoding frames from the transport.
pub const MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// Errors produced while encoding or decoding protocol data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(u8),

    #[error("packet too large: {0} bytes (max {MAX_PACKET_SIZE})")]
    PacketTooLarge(usize),
}
