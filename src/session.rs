//! The request/response exchange over an established connection.

use crate::{
    client::SessionState,
    errors::RconError,
    packet::{Packet, PacketType, MAX_FRAME_LEN, MAX_PAYLOAD_LEN},
    transport::Transport,
};
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite};

/// One authenticated (or authenticating) conversation with a server.
///
/// Requests are strictly lockstep: each call sends one request and consumes
/// its whole response before returning. Calls need `&mut self`, so two
/// requests can never be in flight on the same session.
///
/// After any error the connection is in an unknown state and the session
/// should be closed.
///
/// # Examples
///
/// ```no_run
/// use mc_rcon::RconSession;
/// use tokio::net::TcpStream;
///
/// #[tokio::main]
/// async fn main() -> mc_rcon::Result<()> {
///     let stream = TcpStream::connect("localhost:25575").await?;
///     let mut session = RconSession::new(stream);
///
///     session.login("password").await?;
///     let output = session.execute("list").await?;
///     println!("{}", String::from_utf8_lossy(&output));
///
///     session.close().await
/// }
/// ```
#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub struct RconSession<S> {
    transport: Transport<S>,
    next_request_id: i32,
    authenticated: bool,
    max_frame_len: u32,
}

impl<S> RconSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Start a session over a connected stream. The session is not
    /// authenticated yet.
    pub fn new(stream: S) -> Self {
        Self::from_transport(Transport::new(stream))
    }

    pub(crate) fn from_transport(transport: Transport<S>) -> Self {
        Self {
            transport,
            next_request_id: 0,
            authenticated: false,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Accept received frames up to `max_frame_len` bytes instead of 1455.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Whether [`RconSession::login`] has succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The request ID the next request will use.
    pub fn next_request_id(&self) -> i32 {
        self.next_request_id
    }

    fn allocate_request_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    /// Authenticate with the given password.
    ///
    /// # Errors
    /// Returns [`RconError::AuthenticationFailed`] if the server does not echo
    /// the request ID (servers echo -1 for a wrong password), and
    /// [`RconError::InvalidState`] if the session is already authenticated.
    /// Network and framing problems are returned as they happen.
    pub async fn login(&mut self, password: &str) -> Result<(), RconError> {
        if self.authenticated {
            return Err(RconError::InvalidState {
                operation: "login",
                state: SessionState::Authenticated,
            });
        }

        let request_id = self.allocate_request_id();
        self.send_text(request_id, PacketType::Login, password).await?;

        // the login reply is not checked for its type
        let response = Packet::decode(self.transport.read_frame(self.max_frame_len).await?)?;

        if response.request_id != request_id {
            debug!(
                "login rejected: sent request id {request_id}, got {}",
                response.request_id
            );
            return Err(RconError::AuthenticationFailed {
                expected: request_id,
                received: response.request_id,
            });
        }

        self.authenticated = true;
        trace!("authenticated with request id {request_id}");

        Ok(())
    }

    /// Run a command and return its output.
    ///
    /// Responses longer than one packet arrive in fragments; reading stops at
    /// the first fragment shorter than 4096 bytes. A response of exactly 4096
    /// bytes therefore waits for another fragment.
    ///
    /// # Errors
    /// Returns [`RconError::CorrelationMismatch`] or [`RconError::UnexpectedType`]
    /// if a fragment does not belong to this command, and
    /// [`RconError::InvalidState`] if the session is not authenticated.
    pub async fn execute(&mut self, command: &str) -> Result<Bytes, RconError> {
        if !self.authenticated {
            return Err(RconError::InvalidState {
                operation: "execute",
                state: SessionState::Open,
            });
        }

        let request_id = self.allocate_request_id();
        self.send_text(request_id, PacketType::Execute, command).await?;

        let mut result = BytesMut::new();

        loop {
            let packet = Packet::decode_text(self.transport.read_frame(self.max_frame_len).await?)?;

            if packet.request_id != request_id {
                debug!(
                    "response for request id {} while waiting for {request_id}",
                    packet.request_id
                );
                return Err(RconError::CorrelationMismatch {
                    expected: request_id,
                    received: packet.request_id,
                });
            }

            if packet.packet_type != PacketType::Response {
                return Err(RconError::UnexpectedType(packet.packet_type));
            }

            let payload = packet.must_bytes()?;
            trace!(
                "fragment of {} bytes for request id {request_id}",
                payload.len()
            );
            result.put(payload.clone());

            if payload.len() < MAX_PAYLOAD_LEN {
                break;
            }
        }

        Ok(result.freeze())
    }

    /// Close the connection.
    ///
    /// # Errors
    /// Returns `Err` if the stream could not be shut down cleanly.
    pub async fn close(self) -> Result<(), RconError> {
        self.transport.close().await
    }

    async fn send_text(
        &mut self,
        request_id: i32,
        packet_type: PacketType,
        text: &str,
    ) -> Result<(), RconError> {
        let frame = Packet::new(request_id, packet_type, text).encode_text_framed()?;
        trace!("sending {packet_type:?} packet with request id {request_id}");

        self.transport.send_frame(&frame).await
    }
}
