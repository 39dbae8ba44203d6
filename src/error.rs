use crate::types::TrackerEndpoint;
use std::fmt;
use thiserror::Error;

/// Result type alias for the MogileFS client
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the MogileFS client
#[derive(Error, Debug)]
pub enum Error {
    /// No tracker endpoint could be reached
    #[error("Connection error: {0}")]
    Connection(ConnectFailure),

    /// I/O error on an established tracker connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tracker response was empty, malformed or reported an unhandled failure
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Storage node answered the PUT with something other than 201 Created
    #[error("Upload rejected with HTTP status {0}")]
    UploadStatus(u16),

    /// HTTP transport error during upload
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether this error came from the storage upload step.
    pub fn is_upload(&self) -> bool {
        matches!(self, Error::UploadStatus(_) | Error::Http(_))
    }
}

/// A single failed connection attempt.
#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: TrackerEndpoint,
    pub reason: std::io::Error,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.reason)
    }
}

/// Every endpoint failed; failures are kept in the order they were tried.
#[derive(Debug, Default)]
pub struct ConnectFailure {
    failures: Vec<EndpointFailure>,
}

impl ConnectFailure {
    pub fn new(failures: Vec<EndpointFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[EndpointFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not connect to any tracker ({} tried)",
            self.failures.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { ": " } else { "; " }, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConnectFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &f.reason as &(dyn std::error::Error + 'static))
    }
}
