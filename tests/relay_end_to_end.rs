#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustyrelay::audit::AuditFlag;
use rustyrelay::config::RelayConfig;
use rustyrelay::log::NoopLogSink;
use rustyrelay::relay::{Relay, RelayServer, StopHandle};
use rustyrelay::websocket::{
    Frame, FrameError, Opcode, derive_accept_key, encode_frame, encode_masked_frame, read_frame,
};
use serde_json::Value;

const MAX_FRAME: usize = 1_048_576;

struct TestServer {
    addr: SocketAddr,
    relay: Arc<Relay>,
    stop: StopHandle,
}

impl TestServer {
    fn start() -> Self {
        let config = RelayConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..RelayConfig::default()
        };
        let server = RelayServer::bind(&config, Arc::new(NoopLogSink)).unwrap();
        let addr = server.local_addr().unwrap();
        let relay = server.relay();
        let stop = server.stop_handle().unwrap();
        thread::spawn(move || server.run());
        Self { addr, relay, stop }
    }

    /// Wait until the default room has exactly `n` members.
    fn wait_for_members(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let len = self
                .relay
                .registry()
                .get("default")
                .map(|r| r.len())
                .unwrap_or(0);
            if len == n {
                return;
            }
            assert!(Instant::now() < deadline, "room has {len} members, want {n}");
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    /// Connect, upgrade and consume the welcome message; returns its room count.
    fn join(addr: SocketAddr) -> (Self, u64) {
        let mut client = Self::connect(addr);
        let key = STANDARD.encode(rand::random::<[u8; 16]>());
        client.send_raw(
            format!(
                "GET / HTTP/1.1\r\nHost: {addr}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
                 Sec-WebSocket-Key: {key}\r\nSec-WebSocket-Version: 13\r\n\r\n"
            )
            .as_bytes(),
        );

        let head = client.read_http_head();
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"), "{head}");
        assert!(
            head.contains(&format!("Sec-WebSocket-Accept: {}\r\n", derive_accept_key(&key))),
            "{head}"
        );

        let welcome = client.recv_json();
        assert_eq!(welcome["type"], "welcome");
        assert_eq!(welcome["encrypted"], false);
        let count = welcome["clients_in_room"].as_u64().unwrap();
        (client, count)
    }

    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).unwrap();
    }

    fn send(&mut self, opcode: Opcode, payload: &[u8]) {
        let wire = encode_masked_frame(opcode, payload, rand::random());
        self.send_raw(&wire);
    }

    fn send_text(&mut self, text: &str) {
        self.send(Opcode::Text, text.as_bytes());
    }

    fn read_http_head(&mut self) -> String {
        let mut head = String::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).unwrap() == 0 {
                return head;
            }
            head.push_str(&line);
            if line == "\r\n" {
                return head;
            }
        }
    }

    fn recv(&mut self) -> Result<Frame, FrameError> {
        read_frame(&mut self.reader, MAX_FRAME)
    }

    fn recv_text(&mut self) -> String {
        let frame = self.recv().unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        frame.into_text().unwrap()
    }

    fn recv_json(&mut self) -> Value {
        serde_json::from_str(&self.recv_text()).unwrap()
    }

    /// Nothing arrives within a short window.
    fn assert_silent(&mut self) {
        self.reader
            .get_ref()
            .set_read_timeout(Some(Duration::from_millis(150)))
            .unwrap();
        assert!(matches!(self.recv(), Err(FrameError::Io(_))));
        self.reader
            .get_ref()
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
    }

    /// The server hung up on us.
    fn assert_closed_by_server(&mut self) {
        let mut rest = Vec::new();
        match self.reader.read_to_end(&mut rest) {
            Ok(_) => assert!(rest.is_empty(), "unexpected trailing bytes {rest:?}"),
            Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
        }
    }
}

#[test]
fn upgrade_answers_with_accept_key_and_welcome() {
    let server = TestServer::start();
    let (_a, count) = Client::join(server.addr);
    assert_eq!(count, 1);
    server.wait_for_members(1);
}

#[test]
fn request_without_key_is_refused() {
    let server = TestServer::start();
    let mut client = Client::connect(server.addr);
    client.send_raw(b"GET / HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\n\r\n");

    let head = client.read_http_head();
    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "{head}");
    client.assert_closed_by_server();
    assert!(server.relay.registry().get("default").is_none());
}

#[test]
fn welcome_counts_include_the_newcomer() {
    let server = TestServer::start();
    let (_a, first) = Client::join(server.addr);
    let (_b, second) = Client::join(server.addr);
    let (_c, third) = Client::join(server.addr);
    assert_eq!((first, second, third), (1, 2, 3));
}

#[test]
fn text_fans_out_to_everyone_but_the_sender() {
    let server = TestServer::start();
    let (mut a, _) = Client::join(server.addr);
    let (mut b, _) = Client::join(server.addr);
    let (mut c, _) = Client::join(server.addr);

    let offer = r#"{"type":"offer","sdp":"v=0\r\na=fingerprint:sha-256 12:34\r\n"}"#;
    a.send_text(offer);

    assert_eq!(b.recv_text(), offer);
    assert_eq!(c.recv_text(), offer);
    a.assert_silent();

    let records = server.relay.audit().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message_type, "offer");
    assert_eq!(records[0].room_id, "default");
    assert_eq!(records[0].flags, vec![AuditFlag::FingerprintExposed]);
}

#[test]
fn large_message_uses_extended_length_and_arrives_intact() {
    let server = TestServer::start();
    let (mut a, _) = Client::join(server.addr);
    let (mut b, _) = Client::join(server.addr);

    let sdp = "a=candidate-line\r\n".repeat(5_000);
    let offer = serde_json::json!({"type": "offer", "sdp": sdp}).to_string();
    assert!(offer.len() > 65_535);
    a.send_text(&offer);

    assert_eq!(b.recv_text(), offer);
}

#[test]
fn malformed_json_is_dropped_but_session_survives() {
    let server = TestServer::start();
    let (mut a, _) = Client::join(server.addr);
    let (mut b, _) = Client::join(server.addr);

    a.send_text("this is not json");
    let candidate = r#"{"type":"ice-candidate","candidate":"candidate:1 1 udp 2122260223 192.168.1.5 50000 typ host"}"#;
    a.send_text(candidate);

    assert_eq!(b.recv_text(), candidate);
    let records = server.relay.audit().records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].flags,
        vec![AuditFlag::LocalAddressExposed {
            address: Some("192.168.1.5".into())
        }]
    );
}

#[test]
fn unmasked_client_frame_ends_the_session() {
    let server = TestServer::start();
    let (mut a, _) = Client::join(server.addr);
    let (mut b, _) = Client::join(server.addr);

    a.send_raw(&encode_frame(br#"{"type":"chat"}"#));
    a.assert_closed_by_server();
    server.wait_for_members(1);

    b.assert_silent();
    assert!(server.relay.audit().is_empty());
}

#[test]
fn close_frame_is_echoed_then_connection_ends() {
    let server = TestServer::start();
    let (mut a, _) = Client::join(server.addr);
    let (mut b, _) = Client::join(server.addr);

    a.send(Opcode::Close, &1001u16.to_be_bytes());

    let reply = a.recv().unwrap();
    assert_eq!(reply.opcode, Opcode::Close);
    assert_eq!(reply.close_code(), 1001);
    a.assert_closed_by_server();
    server.wait_for_members(1);

    // The remaining member keeps working.
    let (mut c, count) = Client::join(server.addr);
    assert_eq!(count, 2);
    b.send_text(r#"{"type":"answer","sdp":"v=0"}"#);
    assert_eq!(c.recv_text(), r#"{"type":"answer","sdp":"v=0"}"#);
}

#[test]
fn reserved_close_code_is_answered_with_protocol_error() {
    let server = TestServer::start();
    let (mut a, _) = Client::join(server.addr);

    a.send(Opcode::Close, &1005u16.to_be_bytes());

    let reply = a.recv().unwrap();
    assert_eq!(reply.opcode, Opcode::Close);
    assert_eq!(reply.close_code(), 1002);
    a.assert_closed_by_server();
}

#[test]
fn oversized_upgrade_request_is_cut_off() {
    let server = TestServer::start();
    let mut client = Client::connect(server.addr);

    // One endless header line; the server must give up at its size limit.
    client.send_raw(b"GET / HTTP/1.1\r\nX-Filler: ");
    let filler = vec![b'a'; 4_096];
    let mut sent = 0usize;
    while sent < 1_048_576 {
        if client.writer.write_all(&filler).is_err() {
            break;
        }
        sent += filler.len();
    }

    client.assert_closed_by_server();
    assert!(server.relay.registry().get("default").is_none());
}

#[test]
fn ping_gets_pong_with_same_payload() {
    let server = TestServer::start();
    let (mut a, _) = Client::join(server.addr);

    a.send(Opcode::Ping, b"are you there");
    let pong = a.recv().unwrap();
    assert_eq!(pong.opcode, Opcode::Pong);
    assert_eq!(pong.payload, b"are you there");
}

#[test]
fn abrupt_disconnect_removes_member() {
    let server = TestServer::start();
    let (a, _) = Client::join(server.addr);
    let (mut b, _) = Client::join(server.addr);
    server.wait_for_members(2);

    drop(a);
    server.wait_for_members(1);

    b.send_text(r#"{"type":"chat"}"#);
    b.assert_silent();
    assert_eq!(server.relay.audit().len(), 1);
}
