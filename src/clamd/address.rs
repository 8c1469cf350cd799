// Daemon address parsing
//
// Resolves the CLAMD_PORT style address into a transport target.
// Accepted forms:
//   tcp://host:port      TCP socket
//   unix:///path/to/sock UNIX domain socket
//   /path/to/sock        UNIX domain socket (bare absolute path)
//   host:port            TCP socket (scheme omitted)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::AddressError;

/// Default daemon address used when nothing is configured
pub const DEFAULT_ADDRESS: &str = "tcp://localhost:3310";

/// Where the scanning daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonAddress {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl DaemonAddress {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(path.into())
    }

    fn parse_host_port(input: &str, rest: &str) -> Result<Self, AddressError> {
        let rest = rest.trim_end_matches('/');
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| AddressError::new(input, "missing port"))?;

        // Bracketed IPv6 literal, e.g. [::1]:3310
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(AddressError::new(input, "missing host"));
        }
        if host.contains('/') {
            return Err(AddressError::new(input, "host must not contain a path"));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::new(input, "port is not a number between 1 and 65535"))?;
        if port == 0 {
            return Err(AddressError::new(input, "port must not be 0"));
        }

        Ok(Self::tcp(host, port))
    }
}

impl FromStr for DaemonAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(AddressError::new(s, "address is empty"));
        }

        if let Some(rest) = input.strip_prefix("tcp://") {
            return Self::parse_host_port(input, rest);
        }

        if let Some(rest) = input.strip_prefix("unix://") {
            if !rest.starts_with('/') {
                return Err(AddressError::new(input, "socket path must be absolute"));
            }
            return Ok(Self::unix(rest));
        }

        if let Some((scheme, _)) = input.split_once("://") {
            return Err(AddressError::new(
                input,
                format!("unsupported scheme '{}'", scheme),
            ));
        }

        if input.starts_with('/') {
            return Ok(Self::unix(input));
        }

        Self::parse_host_port(input, input)
    }
}

impl fmt::Display for DaemonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{}]:{}", host, port),
            Self::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Default for DaemonAddress {
    fn default() -> Self {
        Self::tcp("localhost", 3310)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constant() {
        let parsed: DaemonAddress = DEFAULT_ADDRESS.parse().unwrap();
        assert_eq!(parsed, DaemonAddress::default());
    }

    #[test]
    fn test_parse_tcp() {
        let addr: DaemonAddress = "tcp://clamav:3310".parse().unwrap();
        assert_eq!(addr, DaemonAddress::tcp("clamav", 3310));

        let addr: DaemonAddress = "tcp://127.0.0.1:3310/".parse().unwrap();
        assert_eq!(addr, DaemonAddress::tcp("127.0.0.1", 3310));
    }

    #[test]
    fn test_parse_ipv6() {
        let addr: DaemonAddress = "tcp://[::1]:3310".parse().unwrap();
        assert_eq!(addr, DaemonAddress::tcp("::1", 3310));
        assert_eq!(addr.to_string(), "tcp://[::1]:3310");
    }

    #[test]
    fn test_parse_schemeless_host_port() {
        let addr: DaemonAddress = "localhost:3311".parse().unwrap();
        assert_eq!(addr, DaemonAddress::tcp("localhost", 3311));
    }

    #[test]
    fn test_parse_unix() {
        let addr: DaemonAddress = "unix:///run/clamav/clamd.ctl".parse().unwrap();
        assert_eq!(addr, DaemonAddress::unix("/run/clamav/clamd.ctl"));

        let addr: DaemonAddress = "/var/run/clamd.sock".parse().unwrap();
        assert_eq!(addr, DaemonAddress::unix("/var/run/clamd.sock"));
        assert_eq!(addr.to_string(), "unix:///var/run/clamd.sock");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "   ",
            "tcp://",
            "tcp://host",
            "tcp://:3310",
            "tcp://host:0",
            "tcp://host:99999",
            "tcp://host:abc",
            "unix://relative.sock",
            "http://localhost:3310",
            "localhost",
        ] {
            assert!(bad.parse::<DaemonAddress>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_error_names_input() {
        let err = "udp://x:1".parse::<DaemonAddress>().unwrap_err();
        assert!(err.to_string().contains("udp://x:1"));
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
