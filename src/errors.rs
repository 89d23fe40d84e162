//! All the errors defined by this crate.

use crate::{client::SessionState, packet::PacketType};
use std::io::{self, ErrorKind};
use thiserror::Error;
use tokio::time::error::Elapsed;

/// An error from the RCON client.
#[derive(Error, Debug)]
pub enum RconError {
    /// The payload was not of the kind the operation needs.
    ///
    /// Text-mode encoding requires a text payload; decoded packets always
    /// carry raw bytes.
    #[error("payload type mismatch: expected {expected}")]
    TypeMismatch {
        /// The payload kind that was required.
        expected: &'static str,
    },

    /// Encoded payload is longer than 4096 bytes.
    #[error("payload too large: {0} > 4096")]
    PayloadTooLarge(usize),

    /// A frame could not be read off the wire.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// A text payload did not contain a null terminator.
    #[error("payload is not null-terminated")]
    MissingTerminator,

    /// The server did not echo the login request ID.
    ///
    /// Servers reply with a request ID of -1 when the password is wrong, but
    /// any mismatch is reported with this variant.
    #[error("authentication failed (expected request id {expected}, got {received})")]
    AuthenticationFailed {
        /// Request ID of the login packet.
        expected: i32,
        /// Request ID the server echoed.
        received: i32,
    },

    /// A command response carried someone else's request ID.
    #[error("request id mismatch (expected {expected}, got {received})")]
    CorrelationMismatch {
        /// Request ID of the command packet.
        expected: i32,
        /// Request ID the server echoed.
        received: i32,
    },

    /// A command response was not of type `RESPONSE`.
    #[error("unexpected packet type {0:?}")]
    UnexpectedType(PacketType),

    /// Establishing the connection or doing I/O on it failed.
    #[error("connection error")]
    Connection(#[from] io::Error),

    /// The operation is not valid in the session's current state.
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },

    /// A response did not arrive within the configured timeout.
    #[error("timed out waiting for the server")]
    Timeout(#[from] Elapsed),
}

/// Reasons a frame could not be read.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FramingError {
    /// A packet body shorter than its 8-byte header.
    #[error("packet too short: {0} bytes")]
    ShortPacket(usize),

    /// The length prefix is outside the accepted range.
    #[error("invalid frame length {len} (expected 9..={max})")]
    InvalidLength {
        /// Declared length.
        len: u32,
        /// Largest accepted length.
        max: u32,
    },

    /// The stream ended before the declared number of bytes arrived.
    #[error("stream ended after {received} of {expected} bytes")]
    Truncated {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually read.
        received: usize,
    },
}

impl From<RconError> for io::Error {
    fn from(err: RconError) -> Self {
        match err {
            RconError::Connection(err) => err,
            RconError::Timeout(_) => io::Error::new(ErrorKind::TimedOut, err),
            err => io::Error::new(ErrorKind::InvalidData, err),
        }
    }
}
