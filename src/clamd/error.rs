// Errors raised by the clamd client

use std::io;

use thiserror::Error;

/// A daemon address that could not be understood
#[derive(Debug, Error)]
#[error("invalid clamd address '{input}': {reason}")]
pub struct AddressError {
    pub input: String,
    pub reason: String,
}

impl AddressError {
    pub(crate) fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure talking to the scanning daemon
#[derive(Debug, Error)]
pub enum ClamdError {
    /// The connection could not be opened
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Connect, read or write did not finish in time
    #[error("timed out while {operation} {address}")]
    Timeout {
        address: String,
        operation: &'static str,
    },

    /// Read or write failed on an open connection
    #[error("connection to {address} failed: {source}")]
    Io {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Reading the payload to scan failed before it reached the daemon
    #[error("failed to read scan input: {0}")]
    Source(#[source] io::Error),

    /// The daemon answered, but not in a way the command allows
    #[error("unexpected clamd response: {0}")]
    Protocol(String),

    /// A command argument that cannot be sent over the wire
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClamdError {
    /// True for transport failures (unreachable, reset, timed out)
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Timeout { .. } | Self::Io { .. }
        )
    }
}
