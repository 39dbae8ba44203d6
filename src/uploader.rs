use crate::error::{Error, Result};
use bytes::Bytes;
use reqwest::blocking::{Body, Client};
use reqwest::StatusCode;
use std::io::{self, Cursor, Read};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// In-memory upload body with a length known up front.
#[derive(Debug)]
pub struct UploadBody {
    reader: Cursor<Bytes>,
    len: u64,
}

impl UploadBody {
    pub fn new(data: Bytes) -> Self {
        let len = data.len() as u64;
        Self {
            reader: Cursor::new(data),
            len,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for UploadBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Something that can PUT a body to a storage node and report the HTTP status.
pub trait StorageTransport: Send + Sync {
    fn put(&self, url: &Url, body: UploadBody, timeout: Duration) -> Result<u16>;
}

/// `reqwest` blocking transport. Bodies are sent with a declared
/// Content-Length and no `Expect: 100-continue` handshake; idle connections
/// are not kept, so every upload opens and closes its own socket.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self { client })
    }
}

impl StorageTransport for HttpTransport {
    fn put(&self, url: &Url, body: UploadBody, timeout: Duration) -> Result<u16> {
        let len = body.len();
        let response = self
            .client
            .put(url.clone())
            .timeout(timeout)
            .body(Body::sized(body, len))
            .send()?;

        Ok(response.status().as_u16())
    }
}

/// PUT `data` to `url`. Only 201 Created counts as success.
pub fn upload(
    transport: &dyn StorageTransport,
    data: Bytes,
    url: &Url,
    timeout: Duration,
) -> Result<()> {
    let body = UploadBody::new(data);
    let len = body.len();

    let status = transport.put(url, body, timeout)?;
    debug!(%url, bytes = len, status, "storage upload finished");

    if status != StatusCode::CREATED.as_u16() {
        return Err(Error::UploadStatus(status));
    }
    Ok(())
}
