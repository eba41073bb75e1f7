//! TCP packet channel for skiff transfers.
//!
//! Turns a connected socket into the event stream the transfer machine
//! consumes: a read pump decodes length-prefixed frames into
//! `PacketReceived` events, a write pump drains an outbound queue and
//! acknowledges each packet with `PacketSent`. Socket failures surface as a
//! single `TransportError`.
//!
//! # Wire format
//!
//! See the [`wire`] module for the framing details.

pub mod tcp;
pub mod wire;

pub use tcp::{ChannelHandle, accept, connect, from_stream};

use std::time::Duration;

/// Socket read/write buffer size (256 KB).
pub const CHANNEL_BUFFER_SIZE: usize = 256 * 1024;

/// Timeout for the TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced by the packet channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}
