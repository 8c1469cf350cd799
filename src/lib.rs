// clamrest - REST bridge for the ClamAV daemon
// Library exports

pub mod clamd; // clamd wire protocol client
pub mod config;
pub mod metrics;
pub mod readiness; // Startup wait for clamd
pub mod scan;
pub mod server; // HTTP surface
