use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Address of a single tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerEndpoint {
    pub host: String,
    pub port: u16,
}

impl TrackerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TrackerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for TrackerEndpoint {
    type Err = Error;

    /// Parses `host:port`; IPv6 literals must be bracketed (`[::1]:7001`).
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| Error::Configuration(format!("missing port in tracker address: {}", s)))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(Error::Configuration(format!(
                "missing host in tracker address: {}",
                s
            )));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| Error::Configuration(format!("invalid port in {}: {}", s, e)))?;

        Ok(Self::new(host, port))
    }
}

/// Client configuration: trackers in failover priority order and one timeout
/// applied to connects, socket reads/writes and uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub trackers: Vec<TrackerEndpoint>,
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(trackers: Vec<TrackerEndpoint>, timeout_secs: u64) -> Self {
        Self {
            trackers,
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject configurations no operation could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.trackers.is_empty() {
            return Err(Error::Configuration("no trackers configured".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Configuration(
                "timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
