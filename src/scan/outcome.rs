// Verdict classification

use std::fmt;

use crate::clamd::ScanStatus;

/// What a single-stream verdict means for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// No threat found
    Clean,
    /// A signature matched
    Infected,
    /// clamd failed to scan the payload
    Failed,
    /// clamd answered with a line we could not parse
    Malformed,
    /// clamd closed the connection without a verdict
    Unrecognized,
}

impl Outcome {
    pub fn from_status(status: Option<ScanStatus>) -> Self {
        match status {
            Some(ScanStatus::Ok) => Self::Clean,
            Some(ScanStatus::Found) => Self::Infected,
            Some(ScanStatus::Error) => Self::Failed,
            Some(ScanStatus::ParseError) => Self::Malformed,
            None => Self::Unrecognized,
        }
    }

    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Infected => "infected",
            Self::Failed => "error",
            Self::Malformed => "parse_error",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
