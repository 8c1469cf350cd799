// Scan orchestration
//
// Drives the clamd client for uploads and path lookups and classifies the
// daemon's verdict for the HTTP layer.

mod orchestrator;
mod outcome;

pub use orchestrator::{ScanError, Scanner, UploadVerdict};
pub use outcome::Outcome;
