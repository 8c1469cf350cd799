// clamd client module
//
// Transport, wire protocol and client for the ClamAV scanning daemon.

mod address;
mod client;
mod error;
mod protocol;
mod transport;
mod types;

pub use address::{DaemonAddress, DEFAULT_ADDRESS};
pub use client::{ClamdClient, ScanResults};
pub use error::{AddressError, ClamdError};
pub use protocol::{encode_chunk, parse_response_line, ChunkEncoder, Command, DEFAULT_CHUNK_SIZE};
pub use transport::{Connection, Timeouts};
pub use types::{ScanResult, ScanStatus, StatsInfo, VersionInfo};
