// Scan orchestrator
//
// Single-stream scans yield one authoritative verdict; path scans enumerate
// every item clamd reports and are returned as-is.

use std::io;
use std::time::{Duration, Instant};

use futures::{StreamExt, TryStreamExt};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

use super::outcome::Outcome;
use crate::clamd::{ClamdClient, ClamdError, ScanResult};

/// Why a scan could not produce a verdict
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Filename is empty")]
    EmptyFilename,

    #[error("File is empty")]
    EmptyPayload,

    /// The upload itself could not be read
    #[error("{0}")]
    Upload(#[source] io::Error),

    #[error(transparent)]
    Clamd(#[from] ClamdError),
}

impl ScanError {
    /// Rejected before any daemon interaction
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyFilename | Self::EmptyPayload)
    }
}

/// Verdict for one uploaded stream
#[derive(Debug, Clone)]
pub struct UploadVerdict {
    pub filename: String,
    pub outcome: Outcome,
    /// First result clamd reported; `None` only for `Outcome::Unrecognized`
    pub result: Option<ScanResult>,
    pub elapsed: Duration,
}

/// Runs scans against one clamd instance
#[derive(Debug, Clone)]
pub struct Scanner {
    client: ClamdClient,
}

impl Scanner {
    pub fn new(client: ClamdClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClamdClient {
        &self.client
    }

    /// Scan an uploaded byte stream named `filename`
    pub async fn scan_upload<R>(&self, filename: &str, source: R) -> Result<UploadVerdict, ScanError>
    where
        R: AsyncRead + Unpin + Send,
    {
        if filename.is_empty() {
            return Err(ScanError::EmptyFilename);
        }

        let mut source = BufReader::new(source);
        if source.fill_buf().await.map_err(ScanError::Upload)?.is_empty() {
            return Err(ScanError::EmptyPayload);
        }

        info!(filename, "started scanning");
        let started = Instant::now();

        let mut results = self.client.scan_stream(source).await?;
        let result = results.next().await.transpose()?;
        let outcome = Outcome::from_status(result.as_ref().map(|r| r.status));
        let elapsed = started.elapsed();

        match &result {
            Some(r) => info!(
                filename,
                status = %r.status,
                description = %r.description,
                elapsed_ms = elapsed.as_millis() as u64,
                "scan result"
            ),
            None => warn!(filename, "clamd closed the connection without a verdict"),
        }
        info!(filename, outcome = %outcome, "finished scanning");

        Ok(UploadVerdict {
            filename: filename.to_string(),
            outcome,
            result,
            elapsed,
        })
    }

    /// Scan a path on the daemon's filesystem, collecting every result in order
    pub async fn scan_path(&self, path: &str) -> Result<Vec<ScanResult>, ScanError> {
        info!(path, "scanning path");
        let results: Vec<ScanResult> = self.client.scan_path(path).await?.try_collect().await?;
        info!(path, items = results.len(), "path scan finished");
        Ok(results)
    }
}
