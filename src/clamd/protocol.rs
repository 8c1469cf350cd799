// clamd wire protocol
//
// Commands are sent in the null-terminated form (`z<COMMAND>\0`), so every
// reply frame ends in `\0` as well. INSTREAM payloads follow the command as
// a sequence of chunks, each prefixed with its length as a 4-byte big-endian
// integer, closed by a zero-length chunk.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::types::{ScanResult, ScanStatus};

/// Delimiter closing commands and reply frames
pub const FRAME_DELIMITER: u8 = b'\0';

/// Default INSTREAM chunk size; must stay below clamd's StreamMaxLength
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Upper bound for one reply frame
pub const MAX_FRAME_LEN: u64 = 1024 * 1024;

/// Zero-length chunk that ends an INSTREAM payload
const TERMINATOR: [u8; 4] = [0, 0, 0, 0];

/// Commands understood by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Ping,
    Version,
    Stats,
    Instream,
    AllMatchScan(&'a str),
}

impl Command<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Version => "VERSION",
            Self::Stats => "STATS",
            Self::Instream => "INSTREAM",
            Self::AllMatchScan(_) => "ALLMATCHSCAN",
        }
    }

    /// Wire bytes for this command, `z` prefixed and null terminated
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u8(b'z');
        buf.put_slice(self.name().as_bytes());
        if let Self::AllMatchScan(path) = self {
            buf.put_u8(b' ');
            buf.put_slice(path.as_bytes());
        }
        buf.put_u8(FRAME_DELIMITER);
        buf.freeze()
    }
}

/// Frame one INSTREAM chunk: length prefix followed by the bytes
pub fn encode_chunk(data: &[u8]) -> io::Result<Bytes> {
    let len = u32::try_from(data.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk larger than 4 GiB"))?;
    let mut buf = BytesMut::with_capacity(4 + data.len());
    buf.put_u32(len);
    buf.put_slice(data);
    Ok(buf.freeze())
}

/// Turns a byte source into INSTREAM frames
///
/// Every data frame except the last carries exactly `chunk_size` bytes, so
/// an input of N bytes yields ceil(N / chunk_size) data frames followed by
/// the terminator.
pub struct ChunkEncoder<R> {
    source: R,
    buf: Vec<u8>,
    exhausted: bool,
    finished: bool,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> ChunkEncoder<R> {
    pub fn new(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            buf: vec![0; chunk_size.max(1)],
            exhausted: false,
            finished: false,
            bytes_read: 0,
        }
    }

    /// Next frame to write, or `None` once the terminator has been produced
    ///
    /// Errors come from the source only.
    pub async fn next_frame(&mut self) -> io::Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }

        if !self.exhausted {
            let filled = fill(&mut self.source, &mut self.buf).await?;
            if filled < self.buf.len() {
                self.exhausted = true;
            }
            if filled > 0 {
                self.bytes_read += filled as u64;
                return encode_chunk(&self.buf[..filled]).map(Some);
            }
        }

        self.finished = true;
        Ok(Some(Bytes::from_static(&TERMINATOR)))
    }

    /// Payload bytes consumed so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// Read until `buf` is full or the source is at EOF
async fn fill<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Strip a trailing verdict keyword and the space before it
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.strip_suffix(keyword)?;
    if head.is_empty() {
        return Some(head);
    }
    head.strip_suffix(' ')
}

/// Split `Name(hash:size)` into its parts
fn split_signature(signature: &str) -> (String, Option<String>, Option<u64>) {
    let parsed = signature
        .strip_suffix(')')
        .and_then(|s| s.rsplit_once('('))
        .and_then(|(name, info)| {
            let (hash, size) = info.rsplit_once(':')?;
            let size = size.parse().ok()?;
            Some((name.to_string(), Some(hash.to_string()), Some(size)))
        });

    parsed.unwrap_or_else(|| (signature.to_string(), None, None))
}

fn result(raw: &str, path: &str, status: ScanStatus, description: &str) -> ScanResult {
    ScanResult {
        path: path.to_string(),
        status,
        description: description.to_string(),
        hash: None,
        size: None,
        raw: raw.to_string(),
    }
}

/// Parse one verdict line from clamd
///
/// Recognized shapes:
/// - `<path>: OK`
/// - `<path>: <signature> FOUND`
/// - `<path>: <detail> ERROR` or `<detail> ERROR`
///
/// OK and FOUND split the path at the last `": "`, since the signature never
/// contains one. ERROR splits at the first `": "`, since clamd's error detail
/// often does (`lstat() failed: ...`); a path containing `": "` is therefore
/// cut short on ERROR lines.
///
/// Anything else is a `PARSE_ERROR` carrying the raw line as description.
pub fn parse_response_line(line: &str) -> ScanResult {
    let raw = line.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());

    if let Some(head) = strip_keyword(raw, "OK") {
        if head.is_empty() {
            return result(raw, "", ScanStatus::Ok, "");
        }
        if let Some(path) = head.strip_suffix(':') {
            return result(raw, path, ScanStatus::Ok, "");
        }
    }

    if let Some(head) = strip_keyword(raw, "FOUND") {
        if let Some((path, signature)) = head.rsplit_once(": ") {
            if !signature.trim().is_empty() {
                let (name, hash, size) = split_signature(signature.trim());
                let mut found = result(raw, path, ScanStatus::Found, &name);
                found.hash = hash;
                found.size = size;
                return found;
            }
        }
    }

    if let Some(head) = strip_keyword(raw, "ERROR") {
        if let Some(path) = head.strip_suffix(':') {
            return result(raw, path, ScanStatus::Error, "");
        }
        let (path, detail) = head.split_once(": ").unwrap_or(("", head));
        return result(raw, path, ScanStatus::Error, detail.trim());
    }

    result(raw, "", ScanStatus::ParseError, raw)
}
