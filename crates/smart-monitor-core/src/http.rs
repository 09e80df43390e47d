//! Minimal HTTP/1.1 client framing
//!
//! Only what one JSON POST per connection needs: parse the configured URL,
//! write the request head, and pull the status code out of the response.
//! [`exchange`] runs the request over any connected byte stream.

use core::fmt::Write;

use embedded_io_async::{Error as _, ErrorKind, Read, Write as AsyncWrite};
use heapless::String;
use log::debug;

use crate::error::{ConfigError, DeliveryError, EncodeError};

pub const REQUEST_HEAD_CAPACITY: usize = 256;
/// Bytes kept while waiting for the status line.
pub const RESPONSE_HEAD_CAPACITY: usize = 256;

const SCHEME: &str = "http://";
const DEFAULT_PORT: u16 = 80;
const USER_AGENT: &str = "ESP32HTTPClient";

/// Where readings are POSTed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

impl<'a> Endpoint<'a> {
    /// Parse `http://host[:port][/path][?query]`. TLS is not supported.
    ///
    /// A query with no path is kept as is (`?x`); the request line adds the
    /// leading `/`.
    pub fn parse(url: &'a str) -> Result<Self, ConfigError> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or(ConfigError::UnsupportedScheme)?;

        let (authority, path) = match rest.find(['/', '?']) {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>().map_err(|_| ConfigError::InvalidPort)?,
            ),
            None => (authority, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        Ok(Self { host, port, path })
    }
}

/// Write the head of a JSON POST to `endpoint`, blank line included.
pub fn write_request_head<W: Write>(
    out: &mut W,
    endpoint: &Endpoint<'_>,
    content_length: usize,
) -> Result<(), EncodeError> {
    let root = if endpoint.path.starts_with('?') { "/" } else { "" };
    write!(out, "POST {}{} HTTP/1.1\r\n", root, endpoint.path)?;
    if endpoint.port == DEFAULT_PORT {
        write!(out, "Host: {}\r\n", endpoint.host)?;
    } else {
        write!(out, "Host: {}:{}\r\n", endpoint.host, endpoint.port)?;
    }
    write!(
        out,
        "User-Agent: {}\r\n\
         Connection: close\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         \r\n",
        USER_AGENT, content_length
    )?;
    Ok(())
}

pub fn request_head(
    endpoint: &Endpoint<'_>,
    content_length: usize,
) -> Result<String<REQUEST_HEAD_CAPACITY>, EncodeError> {
    let mut head = String::new();
    write_request_head(&mut head, endpoint, content_length)?;
    Ok(head)
}

/// Extract the status code from the start of a response.
///
/// `response` only needs to hold the status line; anything after the first
/// CRLF is ignored.
pub fn parse_status_line(response: &[u8]) -> Result<u16, DeliveryError> {
    let line_end = response
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(response.len());
    let line =
        core::str::from_utf8(&response[..line_end]).map_err(|_| DeliveryError::NoHttpServer)?;

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(DeliveryError::NoHttpServer);
    }

    let code = parts.next().ok_or(DeliveryError::NoHttpServer)?;
    if code.len() != 3 {
        return Err(DeliveryError::NoHttpServer);
    }
    match code.parse::<u16>() {
        Ok(status @ 100..=599) => Ok(status),
        _ => Err(DeliveryError::NoHttpServer),
    }
}

/// True once `buffer` holds a complete status line.
pub fn has_status_line(buffer: &[u8]) -> bool {
    buffer.windows(2).any(|w| w == b"\r\n")
}

/// POST `body` over an already connected stream and return the status code.
///
/// The rest of the response is read and discarded until the peer closes.
/// Read errors of kind [`ErrorKind::TimedOut`] map to
/// [`DeliveryError::ReadTimeout`]; any other read failure, or a close before
/// the first response byte, is [`DeliveryError::ConnectionLost`].
pub async fn exchange<S>(
    stream: &mut S,
    endpoint: &Endpoint<'_>,
    body: &str,
) -> Result<u16, DeliveryError>
where
    S: Read + AsyncWrite,
{
    let head =
        request_head(endpoint, body.len()).map_err(|_| DeliveryError::SendHeaderFailed)?;
    write_all(stream, head.as_bytes(), DeliveryError::SendHeaderFailed).await?;
    write_all(stream, body.as_bytes(), DeliveryError::SendPayloadFailed).await?;
    stream
        .flush()
        .await
        .map_err(|_| DeliveryError::SendPayloadFailed)?;

    let mut response = [0u8; RESPONSE_HEAD_CAPACITY];
    let mut filled = 0;
    while filled < response.len() && !has_status_line(&response[..filled]) {
        match stream.read(&mut response[filled..]).await {
            Ok(0) if filled == 0 => return Err(DeliveryError::ConnectionLost),
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::TimedOut => return Err(DeliveryError::ReadTimeout),
            Err(e) => {
                debug!("Response read failed: {:?}", e.kind());
                return Err(DeliveryError::ConnectionLost);
            }
        }
    }
    let status = parse_status_line(&response[..filled])?;

    drain(stream).await;
    Ok(status)
}

async fn write_all<S: AsyncWrite>(
    stream: &mut S,
    mut bytes: &[u8],
    failure: DeliveryError,
) -> Result<(), DeliveryError> {
    while !bytes.is_empty() {
        match stream.write(bytes).await {
            Ok(0) | Err(_) => return Err(failure),
            Ok(n) => bytes = &bytes[n..],
        }
    }
    Ok(())
}

async fn drain<S: Read>(stream: &mut S) {
    let mut scratch = [0u8; 128];
    while let Ok(n) = stream.read(&mut scratch).await {
        if n == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_io_async::ErrorType;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct StreamError(ErrorKind);

    impl embedded_io_async::Error for StreamError {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    /// Replays scripted read results and records what was written.
    struct ScriptedStream {
        reads: VecDeque<Result<&'static [u8], ErrorKind>>,
        written: Vec<u8>,
        write_limit: Option<usize>,
    }

    impl ScriptedStream {
        fn new(reads: impl IntoIterator<Item = Result<&'static [u8], ErrorKind>>) -> Self {
            Self {
                reads: reads.into_iter().collect(),
                written: Vec::new(),
                write_limit: None,
            }
        }

        /// Fail writes once `limit` bytes have been accepted.
        fn failing_writes_after(mut self, limit: usize) -> Self {
            self.write_limit = Some(limit);
            self
        }
    }

    impl ErrorType for ScriptedStream {
        type Error = StreamError;
    }

    impl Read for ScriptedStream {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
            match self.reads.pop_front() {
                None => Ok(0),
                Some(Err(kind)) => Err(StreamError(kind)),
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.reads.push_front(Ok(&chunk[n..]));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl AsyncWrite for ScriptedStream {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
            let room = match self.write_limit {
                Some(limit) => limit.saturating_sub(self.written.len()),
                None => buf.len(),
            };
            if room == 0 {
                return Err(StreamError(ErrorKind::ConnectionReset));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        async fn flush(&mut self) -> Result<(), StreamError> {
            Ok(())
        }
    }

    fn readings_endpoint() -> Endpoint<'static> {
        Endpoint::parse("http://192.168.1.9:8000/readings/").unwrap()
    }

    #[test]
    fn parses_host_port_path() {
        let endpoint = Endpoint::parse("http://192.168.1.9:8000/readings/").unwrap();
        assert_eq!(
            endpoint,
            Endpoint {
                host: "192.168.1.9",
                port: 8000,
                path: "/readings/"
            }
        );
    }

    #[test]
    fn port_and_path_default() {
        let endpoint = Endpoint::parse("http://monitor.local").unwrap();
        assert_eq!(endpoint.host, "monitor.local");
        assert_eq!(endpoint.port, 80);
        assert_eq!(endpoint.path, "/");
    }

    #[test]
    fn rejects_bad_urls() {
        assert_eq!(
            Endpoint::parse("https://x/"),
            Err(ConfigError::UnsupportedScheme)
        );
        assert_eq!(Endpoint::parse("x:80/"), Err(ConfigError::UnsupportedScheme));
        assert_eq!(Endpoint::parse("http:///readings"), Err(ConfigError::MissingHost));
        assert_eq!(Endpoint::parse("http://h:port/"), Err(ConfigError::InvalidPort));
        assert_eq!(Endpoint::parse("http://h:0/"), Err(ConfigError::InvalidPort));
        assert_eq!(Endpoint::parse("http://h:70000/"), Err(ConfigError::InvalidPort));
    }

    #[test]
    fn query_ends_authority() {
        let endpoint = Endpoint::parse("http://h:8000?x=1").unwrap();
        assert_eq!(
            endpoint,
            Endpoint {
                host: "h",
                port: 8000,
                path: "?x=1"
            }
        );

        let endpoint = Endpoint::parse("http://h?x").unwrap();
        assert_eq!(endpoint.host, "h");
        assert_eq!(endpoint.port, 80);

        let endpoint = Endpoint::parse("http://h:8000/readings/?id=3").unwrap();
        assert_eq!(endpoint.path, "/readings/?id=3");
    }

    #[test]
    fn bare_query_gets_root_path() {
        let endpoint = Endpoint::parse("http://h?x").unwrap();
        let head = request_head(&endpoint, 0).unwrap();
        assert!(head.starts_with("POST /?x HTTP/1.1\r\n"));
    }

    #[test]
    fn request_head_layout() {
        let endpoint = Endpoint::parse("http://192.168.1.9:8000/readings/").unwrap();
        let head = request_head(&endpoint, 42).unwrap();
        assert_eq!(
            head.as_str(),
            "POST /readings/ HTTP/1.1\r\n\
             Host: 192.168.1.9:8000\r\n\
             User-Agent: ESP32HTTPClient\r\n\
             Connection: close\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 42\r\n\
             \r\n"
        );
    }

    #[test]
    fn default_port_omitted_from_host_header() {
        let endpoint = Endpoint::parse("http://example.org/api").unwrap();
        let head = request_head(&endpoint, 0).unwrap();
        assert!(head.contains("Host: example.org\r\n"));
        assert!(head.starts_with("POST /api HTTP/1.1\r\n"));
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line(b"HTTP/1.1 200 OK\r\nServer: x\r\n"), Ok(200));
        assert_eq!(parse_status_line(b"HTTP/1.0 422 Unprocessable Entity\r\n"), Ok(422));
        assert_eq!(parse_status_line(b"HTTP/1.1 204\r\n"), Ok(204));
        assert_eq!(
            parse_status_line(b"SSH-2.0-OpenSSH\r\n"),
            Err(DeliveryError::NoHttpServer)
        );
        assert_eq!(
            parse_status_line(b"HTTP/1.1 2000 OK\r\n"),
            Err(DeliveryError::NoHttpServer)
        );
        assert_eq!(parse_status_line(b""), Err(DeliveryError::NoHttpServer));
    }

    #[test]
    fn exchange_sends_head_then_body() {
        let mut stream = ScriptedStream::new([Ok(&b"HTTP/1.1 201 Created\r\n\r\n"[..])]);

        let status = block_on(exchange(&mut stream, &readings_endpoint(), "{\"a\":1}"));

        assert_eq!(status, Ok(201));
        let sent = core::str::from_utf8(&stream.written).unwrap();
        assert!(sent.starts_with("POST /readings/ HTTP/1.1\r\n"));
        assert!(sent.contains("Content-Length: 7\r\n\r\n"));
        assert!(sent.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn status_line_split_across_reads() {
        let mut stream = ScriptedStream::new([
            Ok(&b"HTT"[..]),
            Ok(&b"P/1.1 2"[..]),
            Ok(&b"00 OK\r"[..]),
            Ok(&b"\nContent-Length: 0\r\n\r\n"[..]),
        ]);

        assert_eq!(block_on(exchange(&mut stream, &readings_endpoint(), "{}")), Ok(200));
        assert!(stream.reads.is_empty());
    }

    #[test]
    fn close_before_response_is_connection_lost() {
        let mut stream = ScriptedStream::new([]);
        assert_eq!(
            block_on(exchange(&mut stream, &readings_endpoint(), "{}")),
            Err(DeliveryError::ConnectionLost)
        );
    }

    #[test]
    fn close_mid_status_line_parses_what_arrived() {
        let mut stream = ScriptedStream::new([Ok(&b"HTTP/1.1 404 Not Found"[..])]);
        assert_eq!(block_on(exchange(&mut stream, &readings_endpoint(), "{}")), Ok(404));

        let mut stream = ScriptedStream::new([Ok(&b"garbage"[..])]);
        assert_eq!(
            block_on(exchange(&mut stream, &readings_endpoint(), "{}")),
            Err(DeliveryError::NoHttpServer)
        );
    }

    #[test]
    fn read_failures_map_to_client_codes() {
        let mut stream = ScriptedStream::new([Ok(&b"HTTP/1.1"[..]), Err(ErrorKind::TimedOut)]);
        let result = block_on(exchange(&mut stream, &readings_endpoint(), "{}"));
        assert_eq!(result, Err(DeliveryError::ReadTimeout));
        assert_eq!(DeliveryError::ReadTimeout.code(), -11);

        let mut stream = ScriptedStream::new([Err(ErrorKind::ConnectionReset)]);
        let result = block_on(exchange(&mut stream, &readings_endpoint(), "{}"));
        assert_eq!(result, Err(DeliveryError::ConnectionLost));
    }

    #[test]
    fn write_failures_map_to_header_or_payload() {
        let mut stream = ScriptedStream::new([]).failing_writes_after(10);
        assert_eq!(
            block_on(exchange(&mut stream, &readings_endpoint(), "{}")),
            Err(DeliveryError::SendHeaderFailed)
        );

        let head_len = request_head(&readings_endpoint(), 2).unwrap().len();
        let mut stream = ScriptedStream::new([]).failing_writes_after(head_len + 1);
        assert_eq!(
            block_on(exchange(&mut stream, &readings_endpoint(), "{}")),
            Err(DeliveryError::SendPayloadFailed)
        );
        assert_eq!(stream.written.len(), head_len + 1);
    }

    #[test]
    fn error_response_still_drained() {
        let mut stream = ScriptedStream::new([
            Ok(&b"HTTP/1.1 500 Internal Server Error\r\n"[..]),
            Ok(&b"\r\noops"[..]),
        ]);
        assert_eq!(block_on(exchange(&mut stream, &readings_endpoint(), "{}")), Ok(500));
        assert!(stream.reads.is_empty());
    }

    #[test]
    fn status_line_detection() {
        assert!(!has_status_line(b"HTTP/1.1 200"));
        assert!(has_status_line(b"HTTP/1.1 200 OK\r\n"));
    }
}
