use crate::codec::TrackerRequest;
use crate::error::{ConnectFailure, EndpointFailure, Error, Result};
use crate::types::TrackerEndpoint;
use socket2::SockRef;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest response line accepted from a tracker, newline included.
pub const MAX_LINE_LEN: u64 = 64 * 1024;

/// Line-oriented connection to one tracker. Closed on drop.
#[derive(Debug)]
pub struct TrackerConnection {
    endpoint: TrackerEndpoint,
    stream: BufReader<TcpStream>,
}

impl TrackerConnection {
    /// Connect to a single tracker, trying each resolved address within `timeout`.
    pub fn open(endpoint: &TrackerEndpoint, timeout: Duration) -> io::Result<Self> {
        let mut last_err = None;
        for addr in (endpoint.host.as_str(), endpoint.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(Self {
                        endpoint: endpoint.clone(),
                        stream: BufReader::new(stream),
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        }))
    }

    pub fn endpoint(&self) -> &TrackerEndpoint {
        &self.endpoint
    }

    /// Keep the socket open on drop until unsent data is delivered or `linger` expires.
    pub fn set_linger(&self, linger: Duration) -> Result<()> {
        SockRef::from(self.stream.get_ref()).set_linger(Some(linger))?;
        Ok(())
    }

    /// Write one request line.
    pub fn send(&mut self, request: &TrackerRequest) -> Result<()> {
        let mut line = request.render();
        debug!(tracker = %self.endpoint, command = request.command(), "sending tracker request");
        line.push('\n');

        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// Read exactly one response line, without its `\n`. Lines must be UTF-8
    /// and at most [`MAX_LINE_LEN`] bytes long.
    pub fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("tracker {} closed the connection", self.endpoint),
            )));
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else if read as u64 == MAX_LINE_LEN {
            return Err(Error::Protocol(format!(
                "response line exceeds {} bytes: {}...",
                MAX_LINE_LEN,
                String::from_utf8_lossy(&buf[..64])
            )));
        }

        String::from_utf8(buf).map_err(|e| {
            Error::Protocol(format!(
                "malformed response: {}",
                String::from_utf8_lossy(e.as_bytes())
            ))
        })
    }

    /// Send a request and read its response line.
    pub fn call(&mut self, request: &TrackerRequest) -> Result<String> {
        self.send(request)?;
        self.read_line()
    }
}

enum Failover<T> {
    Trying(usize),
    Connected(T),
    Exhausted,
}

/// Walk `endpoints` in order with `dial` until one succeeds. Each endpoint is
/// tried once; all failures are reported together if none succeeds.
pub fn connect_with<T, F>(endpoints: &[TrackerEndpoint], mut dial: F) -> Result<T>
where
    F: FnMut(&TrackerEndpoint) -> io::Result<T>,
{
    let mut failures = Vec::new();
    let mut state = Failover::Trying(0);

    loop {
        state = match state {
            Failover::Trying(i) => match endpoints.get(i) {
                None => Failover::Exhausted,
                Some(endpoint) => {
                    debug!(tracker = %endpoint, "connecting to tracker");
                    match dial(endpoint) {
                        Ok(conn) => Failover::Connected(conn),
                        Err(reason) => {
                            warn!(tracker = %endpoint, error = %reason, "tracker unreachable");
                            failures.push(EndpointFailure {
                                endpoint: endpoint.clone(),
                                reason,
                            });
                            Failover::Trying(i + 1)
                        }
                    }
                }
            },
            Failover::Connected(conn) => return Ok(conn),
            Failover::Exhausted => {
                return Err(Error::Connection(ConnectFailure::new(failures)));
            }
        };
    }
}

/// Connect to the first reachable tracker.
pub fn connect(endpoints: &[TrackerEndpoint], timeout: Duration) -> Result<TrackerConnection> {
    connect_with(endpoints, |endpoint| TrackerConnection::open(endpoint, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn endpoints(names: &[&str]) -> Vec<TrackerEndpoint> {
        names.iter().map(|n| TrackerEndpoint::new(*n, 7001)).collect()
    }

    fn refused() -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionRefused, "refused")
    }

    #[test]
    fn test_failover_stops_at_first_success() {
        let mut attempts = Vec::new();
        let result = connect_with(&endpoints(&["a", "b", "c"]), |ep| {
            attempts.push(ep.host.clone());
            if ep.host == "a" {
                Err(refused())
            } else {
                Ok(ep.host.clone())
            }
        });

        assert_eq!(result.unwrap(), "b");
        assert_eq!(attempts, vec!["a", "b"]);
    }

    #[test]
    fn test_failover_exhausted_reports_all() {
        let mut attempts = Vec::new();
        let result: Result<()> = connect_with(&endpoints(&["a", "b"]), |ep| {
            attempts.push(ep.host.clone());
            Err(refused())
        });

        assert_eq!(attempts, vec!["a", "b"]);
        match result {
            Err(Error::Connection(failure)) => {
                let hosts: Vec<_> = failure
                    .failures()
                    .iter()
                    .map(|f| f.endpoint.host.as_str())
                    .collect();
                assert_eq!(hosts, vec!["a", "b"]);
            }
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_failover_empty_list() {
        let result: Result<()> = connect_with(&[], |_| Ok(()));
        assert!(matches!(result, Err(Error::Connection(f)) if f.is_empty()));
    }

    #[test]
    fn test_connection_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = stream;
            stream.write_all(b"OK path=/x\r\n").unwrap();
            line
        });

        let mut conn = connect(
            &[TrackerEndpoint::new("127.0.0.1", port)],
            Duration::from_secs(2),
        )
        .unwrap();
        let response = conn
            .call(&TrackerRequest::new("GET_PATHS").field("key", "k"))
            .unwrap();

        assert_eq!(response, "OK path=/x\r");
        assert_eq!(server.join().unwrap(), "GET_PATHS&key=k\n");
    }

    #[test]
    fn test_read_line_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut conn =
            TrackerConnection::open(&TrackerEndpoint::new("127.0.0.1", port), Duration::from_secs(2))
                .unwrap();
        server.join().unwrap();

        assert!(matches!(conn.read_line(), Err(Error::Io(_))));
    }

    fn connection_receiving(reply: &'static [u8]) -> TrackerConnection {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // Not joined: a reply larger than the socket buffers only drains
        // once the client reads it.
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = stream.write_all(reply);
        });

        TrackerConnection::open(&TrackerEndpoint::new("127.0.0.1", port), Duration::from_secs(2))
            .unwrap()
    }

    #[test]
    fn test_read_line_invalid_utf8() {
        let mut conn = connection_receiving(b"OK path=\xff\xfe\r\n");
        match conn.read_line() {
            Err(Error::Protocol(msg)) => assert!(msg.starts_with("malformed response: OK path=")),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_line_too_long() {
        static LONG: [u8; MAX_LINE_LEN as usize + 16] = [b'a'; MAX_LINE_LEN as usize + 16];
        let mut conn = connection_receiving(&LONG);
        match conn.read_line() {
            Err(Error::Protocol(msg)) => assert!(msg.contains("exceeds")),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_line_at_eof_without_newline() {
        let mut conn = connection_receiving(b"OK path=/x");
        assert_eq!(conn.read_line().unwrap(), "OK path=/x");
    }

    #[test]
    fn test_set_linger() {
        let conn = connection_receiving(b"");
        conn.set_linger(Duration::from_secs(30)).unwrap();
        let linger = SockRef::from(conn.stream.get_ref()).linger().unwrap();
        assert_eq!(linger, Some(Duration::from_secs(30)));
    }
}
