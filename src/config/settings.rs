// Configuration structs

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::clamd::{ClamdClient, DaemonAddress, Timeouts, DEFAULT_CHUNK_SIZE};
use crate::readiness::{ReadinessGate, DEFAULT_ATTEMPTS, DEFAULT_INTERVAL};

/// Default cap on one uploaded request body (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where clamd listens (CLAMD_PORT)
    pub clamd_address: DaemonAddress,

    /// HTTP bind address
    pub listen: SocketAddr,

    /// VERSION attempts before startup gives up
    pub ready_attempts: u32,

    /// Pause between readiness attempts
    pub ready_interval: Duration,

    /// clamd connect and I/O deadlines
    pub timeouts: Timeouts,

    /// INSTREAM chunk size in bytes
    pub chunk_size: usize,

    /// Largest accepted request body for /scan
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clamd_address: DaemonAddress::default(),
            listen: SocketAddr::from(([0, 0, 0, 0], 9000)),
            ready_attempts: DEFAULT_ATTEMPTS,
            ready_interval: DEFAULT_INTERVAL,
            timeouts: Timeouts::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Client for the configured daemon
    pub fn client(&self) -> ClamdClient {
        ClamdClient::new(self.clamd_address.clone())
            .with_timeouts(self.timeouts)
            .with_chunk_size(self.chunk_size)
    }

    pub fn readiness_gate(&self) -> ReadinessGate {
        ReadinessGate::new(self.ready_attempts, self.ready_interval)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > u32::MAX as usize {
            bail!("chunk_size must be between 1 and {} bytes", u32::MAX);
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be greater than 0");
        }
        if self.timeouts.connect.is_zero() || self.timeouts.io.is_zero() {
            bail!("timeouts must be greater than 0 seconds");
        }
        Ok(())
    }
}

/// Optional TOML config file; every key overrides the default
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub clamd_address: Option<String>,
    pub listen: Option<SocketAddr>,
    pub ready_attempts: Option<u32>,
    pub ready_interval_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub io_timeout_secs: Option<u64>,
    pub chunk_size: Option<usize>,
    pub max_upload_bytes: Option<usize>,
}
