//! Encoding and decoding of RCON packets.
//!
//! A packet body is `request_id (i32 LE) || type (i32 LE) || payload || 0x00`.
//! On the wire every body is preceded by its length as a `u32` LE.

use crate::errors::{FramingError, RconError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;

/// Largest payload a single packet may carry.
pub const MAX_PAYLOAD_LEN: usize = 4096;

/// Smallest accepted length prefix: two `i32`s and the pad byte.
pub const MIN_FRAME_LEN: u32 = 9;

/// Largest accepted length prefix unless configured otherwise.
pub const MAX_FRAME_LEN: u32 = 1455;

const HEADER_LEN: usize = size_of::<i32>() * 2;

/// The type field of a packet.
///
/// The value on the wire is controlled by the server, so anything that is not
/// one of the known types decodes to [`PacketType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Command output, also used for the login reply.
    Response,
    /// Run a command.
    Execute,
    /// Authenticate with a password.
    Login,
    /// Any other value.
    Unknown(i32),
}

impl From<PacketType> for i32 {
    fn from(packet_type: PacketType) -> Self {
        match packet_type {
            PacketType::Response => 0,
            PacketType::Execute => 2,
            PacketType::Login => 3,
            PacketType::Unknown(value) => value,
        }
    }
}

impl From<i32> for PacketType {
    fn from(value: i32) -> Self {
        match value {
            0 => PacketType::Response,
            2 => PacketType::Execute,
            3 => PacketType::Login,
            _ => PacketType::Unknown(value),
        }
    }
}

/// Packet data, either logical text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text, sent as UTF-8.
    Text(String),
    /// Bytes, sent unchanged.
    Bytes(Bytes),
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

/// A single RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Chosen by the client, echoed by the server.
    pub request_id: i32,
    /// What the packet is for.
    pub packet_type: PacketType,
    /// Packet data.
    pub payload: Payload,
}

impl Packet {
    /// Create a packet.
    pub fn new(request_id: i32, packet_type: PacketType, payload: impl Into<Payload>) -> Self {
        Self {
            request_id,
            packet_type,
            payload: payload.into(),
        }
    }

    /// The payload as raw bytes.
    ///
    /// # Errors
    /// Returns [`RconError::TypeMismatch`] if the payload is text.
    pub fn must_bytes(&self) -> Result<&Bytes, RconError> {
        match &self.payload {
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Text(_) => Err(RconError::TypeMismatch { expected: "bytes" }),
        }
    }

    /// The payload as text.
    ///
    /// # Errors
    /// Returns [`RconError::TypeMismatch`] if the payload is raw bytes.
    pub fn must_text(&self) -> Result<&str, RconError> {
        match &self.payload {
            Payload::Text(text) => Ok(text),
            Payload::Bytes(_) => Err(RconError::TypeMismatch { expected: "text" }),
        }
    }

    /// Encode the packet body (everything after the length prefix).
    ///
    /// # Errors
    /// Returns [`RconError::PayloadTooLarge`] if the encoded payload is longer
    /// than [`MAX_PAYLOAD_LEN`].
    pub fn encode(&self) -> Result<Bytes, RconError> {
        let data: &[u8] = match &self.payload {
            Payload::Text(text) => text.as_bytes(),
            Payload::Bytes(bytes) => bytes,
        };

        if data.len() > MAX_PAYLOAD_LEN {
            return Err(RconError::PayloadTooLarge(data.len()));
        }

        let mut bytes = BytesMut::with_capacity(HEADER_LEN + data.len() + 1);
        bytes.put_i32_le(self.request_id);
        bytes.put_i32_le(self.packet_type.into());
        bytes.put(data);
        bytes.put_u8(0);

        Ok(bytes.freeze())
    }

    /// Encode the packet body preceded by its length, ready for the wire.
    ///
    /// # Errors
    /// Same as [`Packet::encode`].
    pub fn encode_framed(&self) -> Result<Bytes, RconError> {
        let body = self.encode()?;

        let mut bytes = BytesMut::with_capacity(size_of::<u32>() + body.len());
        bytes.put_u32_le(body.len() as u32);
        bytes.put(body);

        Ok(bytes.freeze())
    }

    /// Encode a text packet: the text gets a null terminator appended before
    /// the size check, so at most 4095 bytes of text fit.
    ///
    /// # Errors
    /// Returns [`RconError::TypeMismatch`] if the payload is not text, and
    /// [`RconError::PayloadTooLarge`] if it does not fit.
    pub fn encode_text(&self) -> Result<Bytes, RconError> {
        self.with_terminator()?.encode()
    }

    /// Framed counterpart of [`Packet::encode_text`].
    ///
    /// # Errors
    /// Same as [`Packet::encode_text`].
    pub fn encode_text_framed(&self) -> Result<Bytes, RconError> {
        self.with_terminator()?.encode_framed()
    }

    fn with_terminator(&self) -> Result<Packet, RconError> {
        let text = self.must_text()?;

        let mut data = BytesMut::with_capacity(text.len() + 1);
        data.put(text.as_bytes());
        data.put_u8(0);

        Ok(Packet::new(self.request_id, self.packet_type, data.freeze()))
    }

    /// Decode a packet body. The last byte is the pad and is dropped without
    /// looking at its value.
    ///
    /// # Errors
    /// Returns [`FramingError::ShortPacket`] if the body has no room for the header.
    pub fn decode(mut bytes: Bytes) -> Result<Packet, RconError> {
        if bytes.len() < HEADER_LEN {
            return Err(FramingError::ShortPacket(bytes.len()).into());
        }

        let request_id = bytes.get_i32_le();
        let packet_type = bytes.get_i32_le();

        // pad
        bytes.truncate(bytes.len().saturating_sub(1));

        Ok(Packet::new(request_id, packet_type.into(), bytes))
    }

    /// Decode a packet body whose payload is null-terminated text. Only the
    /// bytes before the first null are kept.
    ///
    /// # Errors
    /// Returns [`RconError::MissingTerminator`] if the payload has no null
    /// byte, or anything [`Packet::decode`] returns.
    pub fn decode_text(bytes: Bytes) -> Result<Packet, RconError> {
        let mut packet = Self::decode(bytes)?;
        let mut data = packet.must_bytes()?.clone();

        let zero = data
            .iter()
            .position(|&b| b == 0)
            .ok_or(RconError::MissingTerminator)?;
        data.truncate(zero);

        packet.payload = Payload::Bytes(data);
        Ok(packet)
    }
}

impl TryFrom<Bytes> for Packet {
    type Error = RconError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        Self::decode(bytes)
    }
}
