// Daemon transport
//
// One connection per command. Every connect, read and write is bounded by a
// timeout so a hung daemon cannot pin a request task forever.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::trace;

use super::address::DaemonAddress;
use super::error::ClamdError;
use super::protocol::{FRAME_DELIMITER, MAX_FRAME_LEN};

/// Connect and I/O deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub io: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            io: Duration::from_secs(120),
        }
    }
}

trait DaemonStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> DaemonStream for T {}

/// An open connection to clamd
pub struct Connection {
    stream: BufStream<Box<dyn DaemonStream>>,
    address: String,
    io_timeout: Duration,
}

impl Connection {
    /// Open a fresh connection to `address`
    pub async fn open(address: &DaemonAddress, timeouts: Timeouts) -> Result<Self, ClamdError> {
        let label = address.to_string();
        trace!(address = %label, "connecting to clamd");

        let stream: Box<dyn DaemonStream> = match address {
            DaemonAddress::Tcp { host, port } => {
                let connect = TcpStream::connect((host.as_str(), *port));
                let stream = with_deadline(timeouts.connect, "connecting to", connect)
                    .await
                    .map_err(|e| into_connect_error(e, &label))?;
                stream.set_nodelay(true).ok();
                Box::new(stream)
            }
            #[cfg(unix)]
            DaemonAddress::Unix(path) => {
                let connect = tokio::net::UnixStream::connect(path);
                let stream = with_deadline(timeouts.connect, "connecting to", connect)
                    .await
                    .map_err(|e| into_connect_error(e, &label))?;
                Box::new(stream)
            }
            #[cfg(not(unix))]
            DaemonAddress::Unix(_) => {
                return Err(ClamdError::Connect {
                    address: label,
                    source: io::Error::new(
                        io::ErrorKind::Unsupported,
                        "UNIX sockets are not available on this platform",
                    ),
                });
            }
        };

        Ok(Self {
            stream: BufStream::new(stream),
            address: label,
            io_timeout: timeouts.io,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Write bytes in order; buffered until `flush`
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ClamdError> {
        let write = self.stream.write_all(bytes);
        with_deadline(self.io_timeout, "writing to", write)
            .await
            .map_err(|e| into_io_error(e, &self.address))
    }

    pub async fn flush(&mut self) -> Result<(), ClamdError> {
        let flush = self.stream.flush();
        with_deadline(self.io_timeout, "writing to", flush)
            .await
            .map_err(|e| into_io_error(e, &self.address))
    }

    /// Read one null-terminated reply frame
    ///
    /// Returns `None` when the daemon closed the connection without sending
    /// anything further.
    pub async fn read_frame(&mut self) -> Result<Option<String>, ClamdError> {
        let mut buf = Vec::new();
        let mut limited = (&mut self.stream).take(MAX_FRAME_LEN);
        let read = limited.read_until(FRAME_DELIMITER, &mut buf);
        let n = with_deadline(self.io_timeout, "reading from", read)
            .await
            .map_err(|e| into_io_error(e, &self.address))?;

        if n == 0 {
            return Ok(None);
        }

        match buf.last() {
            Some(&FRAME_DELIMITER) => {
                buf.pop();
            }
            _ if n as u64 >= MAX_FRAME_LEN => {
                return Err(ClamdError::Protocol(format!(
                    "reply frame exceeds {} bytes",
                    MAX_FRAME_LEN
                )));
            }
            // Daemon closed without a trailing delimiter; keep what arrived
            _ => {}
        }

        let frame = String::from_utf8_lossy(&buf).into_owned();
        trace!(address = %self.address, frame = %frame, "clamd frame");
        Ok(Some(frame))
    }

    /// Shut down the write half and drop the socket
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Failure of a deadline-bounded operation
enum Deadline {
    Elapsed(&'static str),
    Io(io::Error),
}

async fn with_deadline<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, Deadline>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Deadline::Io(e)),
        Err(_) => Err(Deadline::Elapsed(operation)),
    }
}

fn into_connect_error(err: Deadline, address: &str) -> ClamdError {
    match err {
        Deadline::Elapsed(operation) => ClamdError::Timeout {
            address: address.to_string(),
            operation,
        },
        Deadline::Io(source) => ClamdError::Connect {
            address: address.to_string(),
            source,
        },
    }
}

fn into_io_error(err: Deadline, address: &str) -> ClamdError {
    match err {
        Deadline::Elapsed(operation) => ClamdError::Timeout {
            address: address.to_string(),
            operation,
        },
        Deadline::Io(source) => ClamdError::Io {
            address: address.to_string(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fast() -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(500),
            io: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Connection::open(&DaemonAddress::tcp("127.0.0.1", port), fast())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClamdError::Connect { .. }), "{:?}", err);
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_frames_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut cmd = [0u8; 6];
            socket.read_exact(&mut cmd).await.unwrap();
            assert_eq!(&cmd, b"zPING\0");
            socket.write_all(b"PONG\0second\0").await.unwrap();
        });

        let mut conn = Connection::open(&DaemonAddress::tcp("127.0.0.1", port), fast())
            .await
            .unwrap();
        conn.write_all(b"zPING\0").await.unwrap();
        conn.flush().await.unwrap();

        assert_eq!(conn.read_frame().await.unwrap().as_deref(), Some("PONG"));
        assert_eq!(conn.read_frame().await.unwrap().as_deref(), Some("second"));
        server.await.unwrap();
        assert_eq!(conn.read_frame().await.unwrap(), None);
        conn.close().await;
    }

    #[tokio::test]
    async fn test_read_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // Hold the socket open without replying
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let timeouts = Timeouts {
            connect: Duration::from_millis(500),
            io: Duration::from_millis(50),
        };
        let mut conn = Connection::open(&DaemonAddress::tcp("127.0.0.1", port), timeouts)
            .await
            .unwrap();
        let err = conn.read_frame().await.unwrap_err();
        assert!(matches!(err, ClamdError::Timeout { operation: "reading from", .. }), "{:?}", err);

        server.abort();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clamd.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"ClamAV 1.2.1\0").await.unwrap();
        });

        let mut conn = Connection::open(&DaemonAddress::unix(&path), fast()).await.unwrap();
        assert_eq!(conn.read_frame().await.unwrap().as_deref(), Some("ClamAV 1.2.1"));
        server.await.unwrap();
    }
}
