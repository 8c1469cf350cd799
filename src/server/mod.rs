// clamrest - HTTP server module
// REST bridge in front of clamd

mod handlers;

pub use handlers::{create_router, AppError};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::metrics::ScanMetrics;
use crate::scan::Scanner;

/// Shared state behind every request
pub struct ScanServer {
    config: Config,
    scanner: Scanner,
    metrics: ScanMetrics,
}

impl ScanServer {
    /// Create a new scan server for the configured daemon
    pub fn new(config: Config) -> Result<Self> {
        let scanner = Scanner::new(config.client());
        let metrics = ScanMetrics::new().context("Failed to register metrics")?;

        Ok(Self {
            config,
            scanner,
            metrics,
        })
    }

    /// Bind the configured address and serve until Ctrl-C / SIGTERM
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.listen;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let app = create_router(Arc::new(self)).layer(TraceLayer::new_for_http());

        tracing::info!("Starting clamrest on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")?;

        tracing::info!("clamrest stopped");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
