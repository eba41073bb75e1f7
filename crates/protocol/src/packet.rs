use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ProtocolError;

/// Discriminant for every packet on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Terminal acknowledgement, receiver to sender. Zero-length payload.
    Success,
    /// Terminal failure on the peer that sent it. Payload is a UTF-8 message.
    Error,
    /// UTF-8 JSON: the transfer header and every item header.
    Json,
    /// Opaque item content bytes.
    Binary,
}

impl PacketType {
    /// Wire discriminant byte.
    pub fn as_byte(self) -> u8 {
        match self {
            PacketType::Success => 0,
            PacketType::Error => 1,
            PacketType::Json => 2,
            PacketType::Binary => 3,
        }
    }

    /// Parses a wire discriminant byte.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(PacketType::Success),
            1 => Ok(PacketType::Error),
            2 => Ok(PacketType::Json),
            3 => Ok(PacketType::Binary),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

/// Envelope for everything that crosses the transport.
///
/// The transport delivers packets whole; nothing in the transfer core ever
/// sees a partial payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Creates the terminal acknowledgement packet.
    pub fn success() -> Self {
        Self {
            packet_type: PacketType::Success,
            payload: Vec::new(),
        }
    }

    /// Creates an error packet carrying a UTF-8 message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            packet_type: PacketType::Error,
            payload: message.into().into_bytes(),
        }
    }

    /// Creates a JSON packet from a serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ProtocolError> {
        Ok(Self {
            packet_type: PacketType::Json,
            payload: serde_json::to_vec(value)?,
        })
    }

    /// Creates a binary content packet.
    pub fn binary(data: Vec<u8>) -> Self {
        Self {
            packet_type: PacketType::Binary,
            payload: data,
        }
    }

    /// Deserializes the payload as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Returns the payload as a string, for error packets.
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
