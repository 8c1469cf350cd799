// Metrics module
// Prometheus counters and histograms for scans and daemon traffic

mod scan_metrics;

pub use scan_metrics::ScanMetrics;
