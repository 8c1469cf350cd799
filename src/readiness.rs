// Startup readiness gate
//
// Polls clamd for its version until it answers or the attempt budget runs
// out. Runs once, before the HTTP listener is bound.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::clamd::{ClamdClient, ClamdError, VersionInfo};

/// Default number of VERSION attempts
pub const DEFAULT_ATTEMPTS: u32 = 30;

/// Default pause between attempts
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(4);

/// clamd never answered within the attempt budget
#[derive(Debug, Error)]
#[error("clamd at {address} not ready after {attempts} attempt(s) in {elapsed:?}: {source}")]
pub struct NotReady {
    pub address: String,
    pub attempts: u32,
    pub elapsed: Duration,
    #[source]
    pub source: ClamdError,
}

/// Bounded retry loop around VERSION
#[derive(Debug, Clone, Copy)]
pub struct ReadinessGate {
    max_attempts: u32,
    interval: Duration,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_INTERVAL)
    }
}

impl ReadinessGate {
    /// `max_attempts` below 1 is raised to 1
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Wait until `client` answers VERSION
    pub async fn wait(&self, client: &ClamdClient) -> Result<VersionInfo, NotReady> {
        let address = client.address().to_string();
        self.wait_with(&address, || client.version()).await
    }

    /// Run `probe` until it succeeds, sleeping `interval` between failures
    pub async fn wait_with<F, Fut>(&self, address: &str, mut probe: F) -> Result<VersionInfo, NotReady>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<VersionInfo, ClamdError>>,
    {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            match probe().await {
                Ok(version) => {
                    info!(
                        address,
                        attempt,
                        version = %version,
                        "clamd is ready"
                    );
                    return Ok(version);
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        address,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "clamd not ready, retrying in {:?}",
                        self.interval
                    );
                    tokio::time::sleep(self.interval).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(NotReady {
                        address: address.to_string(),
                        attempts: attempt,
                        elapsed: started.elapsed(),
                        source: e,
                    });
                }
            }
        }
    }
}
