use crate::codec::{parse_response, ResponseFields, TrackerRequest, TrackerResponse};
use crate::error::{Error, Result};
use crate::tracker;
use crate::types::ClientConfig;
use crate::uploader::{self, HttpTransport, StorageTransport};
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const UNKNOWN_KEY: &str = "unknown_key";

/// How long a store connection may hold unsent data after it is dropped.
const STORE_LINGER: Duration = Duration::from_secs(30);

/// Blocking MogileFS client. Every call opens its own tracker connections, so
/// one client can be shared across threads.
pub struct Client {
    config: ClientConfig,
    transport: Box<dyn StorageTransport>,
}

impl Client {
    /// Create a client that uploads over HTTP with `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self {
            config,
            transport: Box::new(transport),
        })
    }

    /// Create a client with a custom storage transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: impl StorageTransport + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport: Box::new(transport),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check whether `key` exists in `domain`.
    pub fn exists(&self, key: &str, domain: &str) -> Result<bool> {
        let mut conn = tracker::connect(&self.config.trackers, self.config.timeout())?;
        let request = TrackerRequest::new("GET_PATHS")
            .field("domain", domain)
            .field("key", key);
        let line = conn.call(&request)?;

        match parse_response(&line)? {
            TrackerResponse::Success(_) => Ok(true),
            TrackerResponse::Failure { code, .. } if code == UNKNOWN_KEY => Ok(false),
            TrackerResponse::Failure { .. } => Err(Error::Protocol(format!(
                "GET_PATHS failed: {}",
                line.trim_end_matches('\r')
            ))),
        }
    }

    /// Store `data` under `key` in `domain` with the given storage class.
    ///
    /// Runs CREATE_OPEN, uploads to the returned path, then sends
    /// CREATE_CLOSE on a fresh connection. If the upload fails the reserved
    /// location is left for the tracker to reap.
    pub fn put(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        domain: &str,
        storage_class: &str,
    ) -> Result<()> {
        let data = data.into();
        let timeout = self.config.timeout();

        let open_fields = {
            let mut conn = tracker::connect(&self.config.trackers, timeout)?;
            conn.set_linger(STORE_LINGER)?;
            let request = TrackerRequest::new("CREATE_OPEN")
                .field("domain", domain)
                .field("class", storage_class)
                .field("key", key);
            let line = conn.call(&request)?;

            match parse_response(&line)? {
                TrackerResponse::Success(fields) => fields,
                TrackerResponse::Failure { .. } => {
                    return Err(Error::Protocol(format!(
                        "CREATE_OPEN failed: {}",
                        line.trim_end_matches('\r')
                    )));
                }
            }
        };

        let close = close_request(key, domain, storage_class, &open_fields)?;
        let path = open_fields
            .get("path")
            .ok_or_else(|| Error::Protocol("no path in response".to_string()))?;
        let url = Url::parse(path)
            .map_err(|e| Error::Protocol(format!("malformed path in response: {}: {}", path, e)))?;

        debug!(key, %url, bytes = data.len(), "uploading to storage node");
        uploader::upload(self.transport.as_ref(), data, &url, timeout)?;

        let mut conn = tracker::connect(&self.config.trackers, timeout)?;
        conn.set_linger(STORE_LINGER)?;
        conn.send(&close)?;

        info!(key, domain, class = storage_class, "stored object");
        Ok(())
    }
}

/// Build the CREATE_CLOSE request for a finished upload.
///
/// Fields, in order: `key`, every CREATE_OPEN field other than `path` with
/// its raw value untouched, `path` passed through the field encoder, then
/// `domain` and `class`.
pub fn close_request(
    key: &str,
    domain: &str,
    storage_class: &str,
    open_fields: &ResponseFields,
) -> Result<TrackerRequest> {
    let path = open_fields
        .get("path")
        .ok_or_else(|| Error::Protocol("no path in response".to_string()))?;

    let request = open_fields
        .iter()
        .filter(|(name, _)| *name != "path")
        .fold(
            TrackerRequest::new("CREATE_CLOSE").field("key", key),
            |req, (name, raw)| req.encoded_field(name, raw),
        )
        .field("path", path)
        .field("domain", domain)
        .field("class", storage_class);

    Ok(request)
}
