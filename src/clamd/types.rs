// Result types produced by the clamd client

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict category for one scanned item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FOUND")]
    Found,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "PARSE_ERROR")]
    ParseError,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Found => "FOUND",
            Self::Error => "ERROR",
            Self::ParseError => "PARSE_ERROR",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One verdict reported by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanResult {
    /// Scanned item (`stream` for INSTREAM, a file path otherwise)
    pub path: String,
    pub status: ScanStatus,
    /// Signature name, error detail, or the raw line for parse errors
    pub description: String,
    /// Signature hash, present when clamd runs with ExtendedDetectionInfo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Matched size in bytes, present with the hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Daemon line this result was parsed from
    #[serde(skip)]
    pub raw: String,
}

impl ScanResult {
    pub fn is_clean(&self) -> bool {
        self.status == ScanStatus::Ok
    }

    pub fn is_infected(&self) -> bool {
        self.status == ScanStatus::Found
    }
}

/// Reply to VERSION, split on `/`
///
/// `ClamAV 1.2.1/27120/Tue Dec 12 08:23:40 2023`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    /// Product and engine version, e.g. `ClamAV 1.2.1`
    pub engine: String,
    /// Signature database version, absent when no database is loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_date: Option<String>,
    pub raw: String,
}

impl VersionInfo {
    pub fn parse(line: &str) -> Self {
        let raw = line.trim().to_string();
        let mut parts = raw.splitn(3, '/');
        let engine = parts.next().unwrap_or_default().trim().to_string();
        let database = parts.next().and_then(|db| db.trim().parse().ok());
        let database_date = parts
            .next()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Self {
            engine,
            database,
            database_date,
            raw,
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Reply to STATS, one field per section header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatsInfo {
    pub pools: String,
    pub state: String,
    pub threads: String,
    pub memstats: String,
    pub queue: String,
    #[serde(skip)]
    pub raw: String,
}

impl StatsInfo {
    pub fn parse(text: &str) -> Self {
        let mut stats = Self {
            raw: text.to_string(),
            ..Self::default()
        };

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "POOLS" => stats.pools = value,
                "STATE" => stats.state = value,
                "THREADS" => stats.threads = value,
                "QUEUE" => stats.queue = value,
                "MEMSTATS" => stats.memstats = value,
                _ => {}
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_result_json_shape() {
        let result = ScanResult {
            path: "stream".to_string(),
            status: ScanStatus::Ok,
            description: String::new(),
            hash: None,
            size: None,
            raw: "stream: OK".to_string(),
        };

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"Path":"stream","Status":"OK","Description":""}"#);
    }

    #[test]
    fn test_scan_result_json_with_hash() {
        let result = ScanResult {
            path: "stream".to_string(),
            status: ScanStatus::Found,
            description: "Eicar-Signature".to_string(),
            hash: Some("44d88612fea8a8f36de82e1278abb02f".to_string()),
            size: Some(68),
            raw: String::new(),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["Status"], "FOUND");
        assert_eq!(value["Hash"], "44d88612fea8a8f36de82e1278abb02f");
        assert_eq!(value["Size"], 68);
    }

    #[test]
    fn test_parse_error_status_name() {
        let json = serde_json::to_string(&ScanStatus::ParseError).unwrap();
        assert_eq!(json, "\"PARSE_ERROR\"");
        assert_eq!(ScanStatus::ParseError.to_string(), "PARSE_ERROR");
    }

    #[test]
    fn test_version_parse() {
        let v = VersionInfo::parse("ClamAV 1.2.1/27120/Tue Dec 12 08:23:40 2023\n");
        assert_eq!(v.engine, "ClamAV 1.2.1");
        assert_eq!(v.database, Some(27120));
        assert_eq!(v.database_date.as_deref(), Some("Tue Dec 12 08:23:40 2023"));
        assert_eq!(v.to_string(), "ClamAV 1.2.1/27120/Tue Dec 12 08:23:40 2023");
    }

    #[test]
    fn test_version_parse_without_database() {
        let v = VersionInfo::parse("ClamAV 1.2.1");
        assert_eq!(v.engine, "ClamAV 1.2.1");
        assert_eq!(v.database, None);
        assert_eq!(v.database_date, None);
    }

    #[test]
    fn test_stats_parse() {
        let text = "POOLS: 1\n\nSTATE: VALID PRIMARY\nTHREADS: live 1  idle 0 max 12 idle-timeout 30\n\
                    QUEUE: 0 items\n\tSTATS 0.000054\n\nMEMSTATS: heap N/A mmap N/A used N/A free N/A \
                    releasable N/A pools 1 pools_used 1306.837M pools_total 1306.882M\nEND";
        let stats = StatsInfo::parse(text);

        assert_eq!(stats.pools, "1");
        assert_eq!(stats.state, "VALID PRIMARY");
        assert_eq!(stats.threads, "live 1  idle 0 max 12 idle-timeout 30");
        assert_eq!(stats.queue, "0 items");
        assert!(stats.memstats.starts_with("heap N/A"));

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["Pools"], "1");
        assert!(value.get("Raw").is_none());
    }
}
