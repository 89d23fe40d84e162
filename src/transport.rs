use crate::{
    errors::{FramingError, RconError},
    packet::MIN_FRAME_LEN,
};
use bytes::{Buf, Bytes};
use log::trace;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter},
    net::TcpStream,
};

/// An ordered, reliable byte stream to the server. Writes are buffered until
/// [`Transport::flush`].
#[derive(Debug)]
pub(crate) struct Transport<S> {
    stream: BufWriter<S>,
}

impl Transport<TcpStream> {
    /// Open a TCP connection to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, RconError> {
        let stream = TcpStream::connect((host, port)).await?;
        trace!("opened tcp stream to {host}:{port}");

        Ok(Self::new(stream))
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufWriter::new(stream),
        }
    }

    /// Read exactly `n` bytes. Running out of stream first is a framing error.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes, RconError> {
        let mut buffer = vec![0; n];
        let mut filled = 0;

        while filled < n {
            let read = self.stream.read(&mut buffer[filled..]).await?;
            if read == 0 {
                return Err(FramingError::Truncated {
                    expected: n,
                    received: filled,
                }
                .into());
            }
            filled += read;
        }

        Ok(Bytes::from(buffer))
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), RconError> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), RconError> {
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush anything still buffered and shut the stream down.
    pub async fn close(mut self) -> Result<(), RconError> {
        self.stream.shutdown().await?;
        trace!("closed stream");
        Ok(())
    }

    /// Read one length-prefixed frame and return its body.
    ///
    /// The prefix must lie in `9..=max_len`.
    pub async fn read_frame(&mut self, max_len: u32) -> Result<Bytes, RconError> {
        let len = self.read_exact(4).await?.get_u32_le();

        if !(MIN_FRAME_LEN..=max_len).contains(&len) {
            return Err(FramingError::InvalidLength { len, max: max_len }.into());
        }

        let body = self.read_exact(len as usize).await?;
        trace!("received frame of {len} bytes");

        Ok(body)
    }

    /// Write an already framed packet and hand it to the OS.
    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<(), RconError> {
        self.write(frame).await?;
        self.flush().await?;
        trace!("sent frame of {} bytes", frame.len());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Transport;
    use crate::{
        errors::{FramingError, RconError},
        packet::MAX_FRAME_LEN,
    };
    use tokio::io::{self, AsyncReadExt, AsyncWriteExt};

    async fn frame_with_len(len: u32) -> Result<usize, RconError> {
        let (client, mut server) = io::duplex(4096);
        let mut transport = Transport::new(client);

        let mut frame = len.to_le_bytes().to_vec();
        frame.resize(4 + len as usize, 0);
        server.write_all(&frame).await?;

        transport.read_frame(MAX_FRAME_LEN).await.map(|body| body.len())
    }

    #[tokio::test]
    async fn test_frame_length_bounds() {
        assert_eq!(frame_with_len(9).await.unwrap(), 9);
        assert_eq!(frame_with_len(1455).await.unwrap(), 1455);

        assert!(matches!(
            frame_with_len(8).await,
            Err(RconError::Framing(FramingError::InvalidLength { len: 8, .. }))
        ));
        assert!(matches!(
            frame_with_len(1456).await,
            Err(RconError::Framing(FramingError::InvalidLength { len: 1456, .. }))
        ));
    }

    #[tokio::test]
    async fn test_truncated_frame() -> io::Result<()> {
        let (client, mut server) = io::duplex(64);
        let mut transport = Transport::new(client);

        server.write_all(&20u32.to_le_bytes()).await?;
        server.write_all(&[0; 12]).await?;
        drop(server);

        assert!(matches!(
            transport.read_frame(MAX_FRAME_LEN).await,
            Err(RconError::Framing(FramingError::Truncated {
                expected: 20,
                received: 12
            }))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_writes_are_buffered_until_flush() -> io::Result<()> {
        let (client, mut server) = io::duplex(64);
        let mut transport = Transport::new(client);

        transport.write(b"ping").await?;
        transport.flush().await?;

        let mut received = [0; 4];
        server.read_exact(&mut received).await?;
        assert_eq!(&received, b"ping");

        transport.close().await?;
        assert_eq!(server.read(&mut received).await?, 0);

        Ok(())
    }
}
