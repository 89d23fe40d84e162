//! The client a caller holds for the lifetime of one RCON connection.

use crate::{config::RconConfig, errors::RconError, session::RconSession, transport::Transport};
use bytes::Bytes;
use log::trace;
use std::{fmt, time::Duration};
use tokio::{net::TcpStream, time::timeout};

/// Where a client is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not connected yet.
    Unopened,
    /// Connected, not authenticated.
    Open,
    /// Logged in; commands may be executed.
    Authenticated,
    /// Closed; no further operations are valid.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unopened => "unopened",
            SessionState::Open => "open",
            SessionState::Authenticated => "authenticated",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
enum Connection {
    Unopened,
    Open(RconSession<TcpStream>),
    Closed,
}

/// Struct that stores the connection and other state of the RCON protocol with the server.
///
/// The client goes through `open`, `login`, any number of `execute` calls and
/// finally `close`. It never closes itself: after an error the connection is
/// unreliable and the caller should `close` it.
///
/// # Examples
///
/// ```no_run
/// use mc_rcon::RconClient;
///
/// #[tokio::main]
/// async fn main() -> mc_rcon::Result<()> {
///     let mut client = RconClient::new("localhost", 25575);
///     client.open().await?;
///     client.login("password").await?;
///
///     let output = client.execute("time set day").await?;
///     println!("{}", String::from_utf8_lossy(&output));
///
///     client.close().await
/// }
/// ```
#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub struct RconClient {
    host: String,
    port: u16,
    timeout: Option<Duration>,
    max_frame_len: u32,
    connection: Connection,
}

impl RconClient {
    /// Construct an [`RconClient`] for the given host and port. Nothing is
    /// connected until [`RconClient::open`].
    ///
    /// Clients constructed this way will wait arbitrarily long (maybe forever!) to recieve
    /// a response from the server. To set a timeout, see [`RconClient::with_timeout`] or
    /// [`RconClient::set_timeout`].
    ///
    /// # Arguments
    /// * `host` - A string slice that holds the hostname of the server to connect to.
    /// * `port` - The port to connect to.
    pub fn new(host: &str, port: u16) -> Self {
        Self::from_config(RconConfig {
            host: host.to_string(),
            port,
            ..RconConfig::default()
        })
    }

    /// Construct an [`RconClient`] that waits at most `timeout` for each response.
    ///
    /// Note that timeouts are not precise, and may vary on the order of milliseconds, because
    /// of the way the async event loop works.
    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Self {
        let mut client = Self::new(host, port);
        client.set_timeout(Some(timeout));
        client
    }

    /// Construct an [`RconClient`] from an [`RconConfig`].
    pub fn from_config(config: RconConfig) -> Self {
        Self {
            timeout: config.timeout(),
            host: config.host,
            port: config.port,
            max_frame_len: config.max_frame_len,
            connection: Connection::Unopened,
        }
    }

    /// Change the timeout for future requests.
    ///
    /// # Arguments
    /// * `timeout` - an option specifying the duration to wait for a response.
    ///               if none, the client may wait forever.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        match &self.connection {
            Connection::Unopened => SessionState::Unopened,
            Connection::Open(session) if session.is_authenticated() => {
                SessionState::Authenticated
            }
            Connection::Open(_) => SessionState::Open,
            Connection::Closed => SessionState::Closed,
        }
    }

    /// Connect to the server.
    ///
    /// # Errors
    /// Returns [`RconError::Connection`] if the connection could not be made,
    /// and [`RconError::InvalidState`] if the client was already opened.
    pub async fn open(&mut self) -> Result<(), RconError> {
        if !matches!(self.connection, Connection::Unopened) {
            return Err(self.invalid_state("open"));
        }

        let transport = Transport::connect(&self.host, self.port).await?;
        let session = RconSession::from_transport(transport).with_max_frame_len(self.max_frame_len);
        self.connection = Connection::Open(session);
        trace!("client state: {}", self.state());

        Ok(())
    }

    /// Authenticate with the server, with the given password.
    ///
    /// If authentication fails, this method will return [`RconError::AuthenticationFailed`]
    /// and the client stays unauthenticated.
    ///
    /// # Arguments
    /// * `password` - A string slice that holds the RCON password.
    ///
    /// # Errors
    /// Returns an appropriate [`RconError`] if the authentication failed or the
    /// client is not open.
    /// Also returns an error if a timeout is set, and the response is not recieved in that timeframe.
    pub async fn login(&mut self, password: &str) -> Result<(), RconError> {
        let to = self.timeout;
        let fut = self.session("login")?.login(password);

        match to {
            None => fut.await?,
            Some(d) => timeout(d, fut).await??,
        }

        trace!("client state: {}", self.state());
        Ok(())
    }

    /// Run the given command on the server and return its raw output.
    ///
    /// The output may be empty, and may contain formatting codes; see
    /// [`strip_formatting`](crate::strip_formatting).
    ///
    /// # Arguments
    /// * `command` - A string slice that holds the command to run. At most 4095 bytes once UTF-8 encoded.
    ///
    /// # Errors
    /// Returns an error if there was a network issue or an [`RconError`] for other failures.
    /// Also returns an error if a timeout was set and a response was not recieved in that timeframe.
    pub async fn execute(&mut self, command: &str) -> Result<Bytes, RconError> {
        let to = self.timeout;
        let fut = self.session("execute")?.execute(command);

        match to {
            None => fut.await,
            Some(d) => timeout(d, fut).await?,
        }
    }

    /// Disconnect from the server and close the RCON connection.
    ///
    /// # Errors
    /// Returns `Err` if there was an issue closing the connection, or if the
    /// client was already closed.
    pub async fn close(&mut self) -> Result<(), RconError> {
        match std::mem::replace(&mut self.connection, Connection::Closed) {
            Connection::Open(session) => session.close().await?,
            Connection::Unopened => {}
            Connection::Closed => return Err(self.invalid_state("close")),
        }

        trace!("client state: {}", self.state());
        Ok(())
    }

    fn session(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut RconSession<TcpStream>, RconError> {
        let state = self.state();

        match &mut self.connection {
            Connection::Open(session) => Ok(session),
            _ => Err(RconError::InvalidState { operation, state }),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> RconError {
        RconError::InvalidState {
            operation,
            state: self.state(),
        }
    }
}

/// Connect, log in, run a single command and disconnect.
///
/// The connection is closed even when logging in or running the command fails.
///
/// # Arguments
/// * `host` - A string slice that holds the hostname of the server to connect to.
/// * `port` - The port to connect to on that server.
/// * `password` - The RCON password.
/// * `command` - The command to run.
///
/// # Errors
/// Returns the first error that happened along the way.
pub async fn run_command(
    host: &str,
    port: u16,
    password: &str,
    command: &str,
) -> Result<Bytes, RconError> {
    let mut client = RconClient::new(host, port);
    client.open().await?;

    let result = login_and_execute(&mut client, password, command).await;
    let closed = client.close().await;

    let output = result?;
    closed?;

    Ok(output)
}

async fn login_and_execute(
    client: &mut RconClient,
    password: &str,
    command: &str,
) -> Result<Bytes, RconError> {
    client.login(password).await?;
    client.execute(command).await
}

create_timeout!(run_command(host: &str, port: u16, password: &str, command: &str) -> Bytes);

#[cfg(test)]
mod tests {
    use super::{run_command, run_command_with_timeout, RconClient, SessionState};
    use crate::{config::RconConfig, errors::RconError};
    use bytes::{BufMut, BytesMut};
    use std::time::Duration;
    use tokio::{
        io::{self, AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    fn server_frame(request_id: i32, text: &[u8]) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        bytes.put_u32_le((text.len() + 10) as u32);
        bytes.put_i32_le(request_id);
        bytes.put_i32_le(0);
        bytes.put(text);
        bytes.put_u16(0x00_00);
        bytes.to_vec()
    }

    /// Read one request and return its request id and text.
    async fn read_request(socket: &mut TcpStream) -> io::Result<(i32, String)> {
        let len = socket.read_u32_le().await?;
        let request_id = socket.read_i32_le().await?;
        let _packet_type = socket.read_i32_le().await?;

        let mut text = vec![0; len as usize - 8];
        socket.read_exact(&mut text).await?;
        text.truncate(text.len() - 2);

        Ok((request_id, String::from_utf8_lossy(&text).into_owned()))
    }

    /// A server that accepts "secret" and answers every command with
    /// "ran <command>".
    async fn fake_server() -> io::Result<(u16, JoinHandle<io::Result<()>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let handle: JoinHandle<io::Result<()>> = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await?;

            let (request_id, password) = read_request(&mut socket).await?;
            let echoed = if password == "secret" { request_id } else { -1 };
            socket.write_all(&server_frame(echoed, b"")).await?;

            loop {
                let (request_id, command) = match read_request(&mut socket).await {
                    Ok(request) => request,
                    Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                    Err(err) => return Err(err),
                };

                if command == "sleep" {
                    continue;
                }

                let output = format!("ran {command}");
                socket
                    .write_all(&server_frame(request_id, output.as_bytes()))
                    .await?;
            }
        });

        Ok((port, handle))
    }

    #[tokio::test]
    async fn test_rcon_command() -> io::Result<()> {
        let (port, server) = fake_server().await?;

        let mut client = RconClient::new("127.0.0.1", port);
        assert_eq!(client.state(), SessionState::Unopened);

        client.open().await?;
        assert_eq!(client.state(), SessionState::Open);

        client.login("secret").await?;
        assert_eq!(client.state(), SessionState::Authenticated);

        assert_eq!(&client.execute("list").await?[..], b"ran list");
        assert_eq!(&client.execute("help").await?[..], b"ran help");

        client.close().await?;
        assert_eq!(client.state(), SessionState::Closed);

        server.await??;
        Ok(())
    }

    #[tokio::test]
    async fn test_rcon_unauthenticated() -> io::Result<()> {
        let (port, _server) = fake_server().await?;

        let mut client = RconClient::new("127.0.0.1", port);
        client.open().await?;
        let result = client.execute("time set day").await;

        assert!(matches!(
            result,
            Err(RconError::InvalidState {
                operation: "execute",
                state: SessionState::Open
            })
        ));

        client.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_rcon_incorrect_password() -> io::Result<()> {
        let (port, _server) = fake_server().await?;

        let mut client = RconClient::new("127.0.0.1", port);
        client.open().await?;
        let result = client.login("incorrect").await;

        assert!(matches!(
            result,
            Err(RconError::AuthenticationFailed { received: -1, .. })
        ));
        assert_eq!(client.state(), SessionState::Open);

        client.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_operations_outside_lifecycle() -> io::Result<()> {
        let mut client = RconClient::new("127.0.0.1", 1);

        assert!(matches!(
            client.login("secret").await,
            Err(RconError::InvalidState {
                state: SessionState::Unopened,
                ..
            })
        ));

        client.close().await?;
        assert!(matches!(
            client.open().await,
            Err(RconError::InvalidState {
                state: SessionState::Closed,
                ..
            })
        ));
        assert!(client.close().await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_connection_refused() -> io::Result<()> {
        let port = TcpListener::bind("127.0.0.1:0").await?.local_addr()?.port();

        let mut client = RconClient::new("127.0.0.1", port);
        assert!(matches!(
            client.open().await,
            Err(RconError::Connection(_))
        ));
        assert_eq!(client.state(), SessionState::Unopened);

        Ok(())
    }

    #[tokio::test]
    async fn test_timeout() -> io::Result<()> {
        let (port, _server) = fake_server().await?;

        let mut client = RconClient::from_config(RconConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..RconConfig::default()
        });
        client.set_timeout(Some(Duration::from_millis(100)));
        client.open().await?;
        client.login("secret").await?;

        assert!(matches!(
            client.execute("sleep").await,
            Err(RconError::Timeout(_))
        ));

        client.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_run_command() -> io::Result<()> {
        let (port, server) = fake_server().await?;

        let output = run_command("127.0.0.1", port, "secret", "say hi").await?;
        assert_eq!(&output[..], b"ran say hi");

        server.await??;
        Ok(())
    }

    #[tokio::test]
    async fn test_run_command_closes_after_failed_login() -> io::Result<()> {
        let (port, server) = fake_server().await?;

        let result = run_command_with_timeout(
            "127.0.0.1",
            port,
            "incorrect",
            "say hi",
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(
            result,
            Err(RconError::AuthenticationFailed { .. })
        ));

        // the fake server only returns once the client hung up
        server.await??;
        Ok(())
    }
}
