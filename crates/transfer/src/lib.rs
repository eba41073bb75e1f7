//! The transfer state machine: a symmetric two-role protocol core that moves
//! a bundle of items between two devices over an established packet
//! transport.
//!
//! The machine is single-threaded and event-driven. The transport pushes
//! [`TransferEvent`]s in; the machine pushes packets out through the
//! [`PacketSink`] seam and announces observable changes as
//! [`TransferSignal`]s on a one-way channel. Every event handler runs to
//! completion, so there is no locking over transfer state and notifications
//! are naturally serialized.
//!
//! Sending and receiving share one packet schema and one termination
//! protocol but differ in who drives advancement: the sender reacts to
//! `PacketSent` (one outbound packet per event), the receiver to
//! `PacketReceived`.

mod driver;
mod machine;
mod state;

pub use driver::drive;
pub use machine::Transfer;
pub use state::{
    Direction, PacketSink, TransferContext, TransferEvent, TransferSignal, TransferState,
};
