// clamd protocol client
//
// Every operation opens its own connection, sends one command and reads the
// reply. Nothing is shared between calls except the immutable address and
// limits, so the client can be cloned freely into request handlers.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::AsyncRead;
use tracing::{debug, trace};

use super::address::DaemonAddress;
use super::error::ClamdError;
use super::protocol::{parse_response_line, ChunkEncoder, Command, DEFAULT_CHUNK_SIZE};
use super::transport::{Connection, Timeouts};
use super::types::{ScanResult, StatsInfo, VersionInfo};

/// Lazily parsed verdicts, read off the connection as they are polled
pub type ScanResults = BoxStream<'static, Result<ScanResult, ClamdError>>;

/// Client for a single clamd instance
#[derive(Debug, Clone)]
pub struct ClamdClient {
    address: DaemonAddress,
    timeouts: Timeouts,
    chunk_size: usize,
}

impl ClamdClient {
    pub fn new(address: DaemonAddress) -> Self {
        Self {
            address,
            timeouts: Timeouts::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Maximum INSTREAM chunk size (at least one byte)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn address(&self) -> &DaemonAddress {
        &self.address
    }

    /// Open a connection and send `command`
    async fn send(&self, command: &Command<'_>) -> Result<Connection, ClamdError> {
        let mut conn = Connection::open(&self.address, self.timeouts).await?;
        trace!(address = %conn.address(), command = command.name(), "sending clamd command");
        conn.write_all(&command.encode()).await?;
        conn.flush().await?;
        Ok(conn)
    }

    /// Send `command` and return its one-frame reply
    async fn request(&self, command: Command<'_>) -> Result<String, ClamdError> {
        let mut conn = self.send(&command).await?;
        let reply = conn.read_frame().await?;
        conn.close().await;

        reply
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                ClamdError::Protocol(format!(
                    "connection closed before reply to {}",
                    command.name()
                ))
            })
    }

    /// Liveness check
    pub async fn ping(&self) -> Result<(), ClamdError> {
        let reply = self.request(Command::Ping).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(ClamdError::Protocol(format!("expected PONG, got '{}'", reply)))
        }
    }

    /// Engine and signature database version
    pub async fn version(&self) -> Result<VersionInfo, ClamdError> {
        let reply = self.request(Command::Version).await?;
        Ok(VersionInfo::parse(&reply))
    }

    /// Thread pool, queue and memory statistics
    pub async fn stats(&self) -> Result<StatsInfo, ClamdError> {
        let reply = self.request(Command::Stats).await?;
        Ok(StatsInfo::parse(&reply))
    }

    /// Stream `source` to clamd with INSTREAM
    ///
    /// The whole source is transferred before this returns; the verdict is
    /// read when the returned stream is polled and is always exactly one
    /// item for a well-behaved daemon.
    pub async fn scan_stream<R>(&self, source: R) -> Result<ScanResults, ClamdError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut conn = self.send(&Command::Instream).await?;
        let mut encoder = ChunkEncoder::new(source, self.chunk_size);
        let mut chunks = 0u64;

        while let Some(frame) = encoder.next_frame().await.map_err(ClamdError::Source)? {
            conn.write_all(&frame).await?;
            chunks += 1;
        }
        conn.flush().await?;

        debug!(
            address = %conn.address(),
            bytes = encoder.bytes_read(),
            chunks,
            "stream sent to clamd"
        );

        Ok(results(conn))
    }

    /// Scan a path local to the daemon, reporting every match
    pub async fn scan_path(&self, path: &str) -> Result<ScanResults, ClamdError> {
        if path.is_empty() {
            return Err(ClamdError::InvalidArgument("path is empty".to_string()));
        }
        if path.contains('\0') {
            return Err(ClamdError::InvalidArgument(
                "path must not contain NUL bytes".to_string(),
            ));
        }

        let conn = self.send(&Command::AllMatchScan(path)).await?;
        Ok(results(conn))
    }
}

/// Parse reply frames until the daemon closes the connection
fn results(conn: Connection) -> ScanResults {
    stream::try_unfold(conn, |mut conn| async move {
        let next = loop {
            match conn.read_frame().await? {
                Some(frame) if frame.trim().is_empty() => continue,
                Some(frame) => break Some((parse_response_line(&frame), conn)),
                None => break None,
            }
        };
        Ok::<_, ClamdError>(next)
    })
    .boxed()
}
