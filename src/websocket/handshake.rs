use std::collections::HashMap;
use std::io::{self, BufRead};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

use crate::websocket::constants::WS_GUID;
use crate::websocket::handshake_error::HandshakeError;

const KEY_HEADER: &str = "sec-websocket-key";

/// Best-effort answer to a request that cannot be upgraded.
pub const BAD_REQUEST_RESPONSE: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// The `101 Switching Protocols` answer to a valid upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub accept_key: String,
    bytes: Vec<u8>,
}

impl HandshakeResponse {
    /// Exact response bytes to write before any frame traffic.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Turn a raw HTTP upgrade request into the upgrade response.
///
/// Only `Sec-WebSocket-Key` is required; header names match case-insensitively.
pub fn negotiate(raw_request: &[u8]) -> Result<HandshakeResponse, HandshakeError> {
    let text = String::from_utf8_lossy(raw_request);
    let headers = parse_headers(&text);

    let key = headers
        .get(KEY_HEADER)
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .ok_or(HandshakeError::MissingKey)?;

    let accept_key = derive_accept_key(key);
    let bytes = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n\r\n"
    )
    .into_bytes();

    Ok(HandshakeResponse { accept_key, bytes })
}

/// `base64(sha1(key + GUID))`.
pub fn derive_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Read the upgrade request up to and including the blank line.
///
/// Reads line by line so no frame bytes sent early are swallowed from `r`.
pub fn read_request<R: BufRead>(r: &mut R, max_len: usize) -> Result<Vec<u8>, HandshakeError> {
    read_request_within(r, max_len, None, |_, _| Ok(()))
}

/// Like [`read_request`], but the whole request must arrive before `deadline`.
///
/// `set_timeout` is called before every read with the time left, so a blocking
/// socket never waits past the deadline however slowly the bytes trickle in.
/// Never holds more than `max_len` bytes of request.
pub fn read_request_within<R, F>(
    r: &mut R,
    max_len: usize,
    deadline: Option<Instant>,
    mut set_timeout: F,
) -> Result<Vec<u8>, HandshakeError>
where
    R: BufRead,
    F: FnMut(&mut R, Duration) -> io::Result<()>,
{
    let mut request = Vec::new();
    let mut line_start = 0;

    loop {
        if let Some(deadline) = deadline {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(HandshakeError::TimedOut);
            }
            set_timeout(r, left)?;
        }

        let available = match r.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if deadline.is_some()
                    && matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
            {
                return Err(HandshakeError::TimedOut);
            }
            Err(e) => return Err(e.into()),
        };
        if available.is_empty() {
            return Err(HandshakeError::ConnectionClosed);
        }

        let (take, line_done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        if take > max_len - request.len() {
            return Err(HandshakeError::RequestTooLarge { max: max_len });
        }
        request.extend_from_slice(&available[..take]);
        r.consume(take);

        if line_done {
            let line = &request[line_start..];
            if line == b"\r\n" || line == b"\n" {
                return Ok(request);
            }
            line_start = request.len();
        }
    }
}

/// Header lines are the lines after the request line that contain `": "`.
fn parse_headers(text: &str) -> HashMap<String, String> {
    text.split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(": "))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::thread;

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn request_with(headers: &str) -> Vec<u8> {
        format!("GET /chat HTTP/1.1\r\nHost: localhost:8080\r\n{headers}\r\n").into_bytes()
    }

    #[test]
    fn accept_key_matches_rfc_fixture() {
        assert_eq!(derive_accept_key(SAMPLE_KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn negotiate_builds_exact_response() {
        let req = request_with(&format!(
            "Upgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {SAMPLE_KEY}\r\nSec-WebSocket-Version: 13\r\n"
        ));
        let resp = negotiate(&req).unwrap();
        assert_eq!(resp.accept_key, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(
            resp.as_bytes(),
            b"HTTP/1.1 101 Switching Protocols\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
        );
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let req = request_with(&format!("sec-websocket-key: {SAMPLE_KEY}\r\n"));
        assert_eq!(
            negotiate(&req).unwrap().accept_key,
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn missing_key_is_refused() {
        let req = request_with("Upgrade: websocket\r\nConnection: Upgrade\r\n");
        assert!(matches!(negotiate(&req), Err(HandshakeError::MissingKey)));

        let empty = request_with("Sec-WebSocket-Key: \r\n");
        assert!(matches!(negotiate(&empty), Err(HandshakeError::MissingKey)));
    }

    #[test]
    fn read_request_stops_at_blank_line() {
        let mut wire = request_with(&format!("Sec-WebSocket-Key: {SAMPLE_KEY}\r\n"));
        let request_len = wire.len();
        wire.extend_from_slice(&[0x81, 0x80, 1, 2, 3, 4]);

        let mut cursor = Cursor::new(wire);
        let request = read_request(&mut cursor, 8_192).unwrap();
        assert_eq!(request.len(), request_len);
        assert_eq!(cursor.position() as usize, request_len);
    }

    /// Counts bytes pulled from an endless stream.
    struct Counting<R> {
        inner: R,
        pulled: usize,
    }

    impl<R: Read> Read for Counting<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.pulled += n;
            Ok(n)
        }
    }

    /// Hands out one byte per read, pausing before each.
    struct Trickle {
        bytes: Vec<u8>,
        pos: usize,
        pause: Duration,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.pause);
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn endless_line_stops_at_the_size_limit() {
        let mut reader = BufReader::with_capacity(
            1_024,
            Counting {
                inner: io::repeat(b'a'),
                pulled: 0,
            },
        );

        assert!(matches!(
            read_request(&mut reader, 8_192),
            Err(HandshakeError::RequestTooLarge { max: 8_192 })
        ));
        let pulled = reader.get_ref().pulled;
        assert!(pulled <= 8_192 + 1_024, "pulled {pulled} bytes");
    }

    #[test]
    fn request_exactly_at_the_limit_is_accepted() {
        let wire = request_with(&format!("Sec-WebSocket-Key: {SAMPLE_KEY}\r\n"));
        let len = wire.len();
        assert_eq!(read_request(&mut Cursor::new(wire.clone()), len).unwrap(), wire);
        assert!(matches!(
            read_request(&mut Cursor::new(wire), len - 1),
            Err(HandshakeError::RequestTooLarge { .. })
        ));
    }

    #[test]
    fn trickled_request_times_out_as_a_whole() {
        let mut reader = BufReader::new(Trickle {
            bytes: request_with(&format!("Sec-WebSocket-Key: {SAMPLE_KEY}\r\n")),
            pos: 0,
            pause: Duration::from_millis(20),
        });
        let mut timeouts = Vec::new();
        let started = Instant::now();

        let result = read_request_within(
            &mut reader,
            8_192,
            Some(started + Duration::from_millis(150)),
            |_, left| {
                timeouts.push(left);
                Ok(())
            },
        );

        assert!(matches!(result, Err(HandshakeError::TimedOut)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(timeouts.windows(2).all(|w| w[1] <= w[0]), "time left only shrinks");
        assert!(timeouts.iter().all(|t| *t <= Duration::from_millis(150)));
    }

    #[test]
    fn read_request_enforces_limits() {
        let mut hung_up = Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\n".to_vec());
        assert!(matches!(
            read_request(&mut hung_up, 8_192),
            Err(HandshakeError::ConnectionClosed)
        ));

        let mut huge = Cursor::new(request_with(&"X-Padding: aaaaaaaaaaaaaaaa\r\n".repeat(10)));
        assert!(matches!(
            read_request(&mut huge, 64),
            Err(HandshakeError::RequestTooLarge { max: 64 })
        ));
    }
}
