// Scan metrics
//
// Owned by the server state and rendered at GET /metrics in the Prometheus
// text format.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::scan::Outcome;

/// Latency buckets for one upload scan, in seconds
const SCAN_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

pub struct ScanMetrics {
    registry: Registry,
    scans: IntCounterVec,
    scan_duration: Histogram,
    rejected: IntCounterVec,
    daemon_errors: IntCounterVec,
}

impl ScanMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("clamrest".to_string()), None)?;

        let scans = IntCounterVec::new(
            Opts::new("scans_total", "Uploads scanned, by verdict outcome"),
            &["outcome"],
        )?;
        let scan_duration = Histogram::with_opts(
            HistogramOpts::new(
                "scan_duration_seconds",
                "Time from first chunk sent to verdict received",
            )
            .buckets(SCAN_DURATION_BUCKETS.to_vec()),
        )?;
        let rejected = IntCounterVec::new(
            Opts::new("rejected_uploads_total", "Uploads rejected before reaching clamd"),
            &["reason"],
        )?;
        let daemon_errors = IntCounterVec::new(
            Opts::new("daemon_errors_total", "Failed clamd operations"),
            &["operation"],
        )?;

        registry.register(Box::new(scans.clone()))?;
        registry.register(Box::new(scan_duration.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(daemon_errors.clone()))?;

        Ok(Self {
            registry,
            scans,
            scan_duration,
            rejected,
            daemon_errors,
        })
    }

    /// Record a finished upload scan
    pub fn observe_scan(&self, outcome: Outcome, elapsed: Duration) {
        self.scans.with_label_values(&[outcome.as_str()]).inc();
        self.scan_duration.observe(elapsed.as_secs_f64());
    }

    /// Record an upload rejected by validation
    pub fn observe_rejected(&self, reason: &str) {
        self.rejected.with_label_values(&[reason]).inc();
    }

    /// Record a failed clamd operation (`scan`, `scan_path`, `stats`, ...)
    pub fn observe_daemon_error(&self, operation: &str) {
        self.daemon_errors.with_label_values(&[operation]).inc();
    }

    /// Render every metric in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_observations() {
        let metrics = ScanMetrics::new().unwrap();
        metrics.observe_scan(Outcome::Clean, Duration::from_millis(20));
        metrics.observe_scan(Outcome::Infected, Duration::from_millis(40));
        metrics.observe_scan(Outcome::Infected, Duration::from_millis(40));
        metrics.observe_rejected("empty_filename");
        metrics.observe_daemon_error("stats");

        let text = metrics.render().unwrap();
        assert!(text.contains("clamrest_scans_total{outcome=\"clean\"} 1"));
        assert!(text.contains("clamrest_scans_total{outcome=\"infected\"} 2"));
        assert!(text.contains("clamrest_scan_duration_seconds_count 3"));
        assert!(text.contains("clamrest_rejected_uploads_total{reason=\"empty_filename\"} 1"));
        assert!(text.contains("clamrest_daemon_errors_total{operation=\"stats\"} 1"));
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let a = ScanMetrics::new().unwrap();
        let b = ScanMetrics::new().unwrap();
        a.observe_scan(Outcome::Clean, Duration::from_millis(1));

        assert!(!b.render().unwrap().contains("outcome=\"clean\""));
    }
}
