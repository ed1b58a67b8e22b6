use std::io::{self, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Instant;

use crate::config::WebSocketSettings;
use crate::log::log_sink::LogSink;
use crate::relay::peer::PeerId;
use crate::relay::relay::Relay;
use crate::relay::relay_error::RelayError;
use crate::relay::room::Room;
use crate::relay::session_handle::SessionHandle;
use crate::relay::session_state::SessionState;
use crate::websocket::handshake::BAD_REQUEST_RESPONSE;
use crate::websocket::{
    Frame, FrameError, HandshakeError, Opcode, check_client_frame, negotiate, read_frame,
    read_request_within, write_frame,
};
use crate::{sink_debug, sink_info, sink_warn};

/// Why a session's read loop ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client sent a close frame; holds the status to answer with.
    ClientClosed(u16),
    /// Socket closed or failed; also how a close from another thread shows up.
    Transport(FrameError),
    /// The client broke the protocol.
    Protocol(FrameError),
}

/// One client connection: handshake, then a read loop feeding the relay.
///
/// The reading half lives here on the session thread; the writing half is a
/// separate writer thread fed through the `SessionHandle`.
pub struct Session {
    id: PeerId,
    handle: Arc<SessionHandle>,
    reader: BufReader<TcpStream>,
    settings: WebSocketSettings,
    relay: Arc<Relay>,
    log: Arc<dyn LogSink>,
}

/// Spawn the thread that drives a freshly accepted connection.
pub fn spawn_session(
    id: PeerId,
    stream: TcpStream,
    room_id: String,
    relay: Arc<Relay>,
    settings: WebSocketSettings,
    log: Arc<dyn LogSink>,
) -> io::Result<()> {
    let (to_writer, from_handle) = mpsc::channel::<Frame>();
    let handle = Arc::new(SessionHandle::new(id, stream.try_clone()?, to_writer));
    let reader = BufReader::new(stream.try_clone()?);

    let session = Session {
        id,
        handle,
        reader,
        settings,
        relay,
        log,
    };

    thread::Builder::new()
        .name(format!("session-{id}"))
        .spawn(move || session.run(stream, &room_id, from_handle))?;
    Ok(())
}

impl Session {
    fn run(mut self, mut writer: TcpStream, room_id: &str, from_handle: Receiver<Frame>) {
        self.handle.advance(SessionState::Handshaking);

        // A failed upgrade goes straight to Closed; the session never opened.
        if let Err(e) = self.handshake(&mut writer) {
            sink_warn!(self.log, "[session {}] handshake refused: {}", self.id, e);
            let _ = writer.shutdown(Shutdown::Both);
            self.handle.mark_closed();
            return;
        }

        if let Err(e) = self.spawn_writer(writer, from_handle) {
            sink_warn!(self.log, "[session {}] cannot start writer: {}", self.id, e);
            self.handle.close();
            self.handle.mark_closed();
            return;
        }

        self.handle.advance(SessionState::Open);
        let room = self.relay.join(room_id, self.handle.clone());

        let end = self.read_loop(&room);
        match &end {
            SessionEnd::ClientClosed(code) => {
                sink_info!(self.log, "[session {}] client closed ({})", self.id, code);
                self.handle.close_with(Frame::close(*code));
            }
            SessionEnd::Transport(e) => {
                sink_info!(self.log, "[session {}] disconnected: {}", self.id, e);
                self.handle.close();
            }
            SessionEnd::Protocol(e) => {
                sink_warn!(self.log, "[session {}] protocol error: {}", self.id, e);
                self.handle.close();
            }
        }

        self.relay.leave(&room, self.id);
        self.handle.mark_closed();
    }

    /// Read the upgrade request and answer it; nothing else is written before this.
    fn handshake(&mut self, writer: &mut TcpStream) -> Result<(), HandshakeError> {
        writer.set_nodelay(true)?;
        writer.set_write_timeout(Some(self.settings.write_timeout))?;
        let deadline = Instant::now() + self.settings.handshake_timeout;
        let request = read_request_within(
            &mut self.reader,
            self.settings.max_handshake_len,
            Some(deadline),
            |r, left| r.get_ref().set_read_timeout(Some(left)),
        )?;
        let response = match negotiate(&request) {
            Ok(r) => r,
            Err(e) => {
                let _ = writer.write_all(BAD_REQUEST_RESPONSE);
                return Err(e);
            }
        };
        writer.write_all(response.as_bytes())?;
        writer.flush()?;

        // Once open, a client may stay silent for as long as it likes.
        self.reader.get_ref().set_read_timeout(None)?;
        sink_debug!(
            self.log,
            "[session {}] upgraded (accept {})",
            self.id,
            response.accept_key
        );
        Ok(())
    }

    fn spawn_writer(&self, writer: TcpStream, from_handle: Receiver<Frame>) -> io::Result<()> {
        let id = self.id;
        let handle = self.handle.clone();
        let log = self.log.clone();
        thread::Builder::new()
            .name(format!("session-{id}-writer"))
            .spawn(move || run_writer(id, writer, from_handle, handle, log))?;
        Ok(())
    }

    /// Frames are handled strictly in arrival order, one at a time.
    fn read_loop(&mut self, room: &Room) -> SessionEnd {
        loop {
            let frame = match read_frame(&mut self.reader, self.settings.max_frame_len)
                .and_then(|f| check_client_frame(&f, self.settings.require_masked).map(|()| f))
            {
                Ok(f) => f,
                Err(e) if e.is_transport() => return SessionEnd::Transport(e),
                Err(e) => return SessionEnd::Protocol(e),
            };

            match frame.opcode {
                Opcode::Text => {
                    let text = match frame.into_text() {
                        Ok(t) => t,
                        Err(e) => return SessionEnd::Protocol(e),
                    };
                    // Malformed JSON is logged by the relay and dropped; the session carries on.
                    let _ = self.relay.relay_text(room, self.id, &text);
                }
                Opcode::Ping => {
                    if let Err(RelayError::PeerClosed(_)) =
                        self.handle.send_frame(Frame::pong(frame.payload))
                    {
                        return SessionEnd::Transport(FrameError::ConnectionClosed);
                    }
                }
                Opcode::Pong => {}
                Opcode::Close => return SessionEnd::ClientClosed(frame.reply_close_code()),
                Opcode::Binary | Opcode::Continuation => {
                    return SessionEnd::Protocol(FrameError::UnsupportedOpcode(
                        frame.opcode.as_u8(),
                    ));
                }
            }
        }
    }
}

/// Drain queued frames onto the socket until the handle lets go of the sender.
fn run_writer(
    id: PeerId,
    mut stream: TcpStream,
    from_handle: Receiver<Frame>,
    handle: Arc<SessionHandle>,
    log: Arc<dyn LogSink>,
) {
    while let Ok(frame) = from_handle.recv() {
        if let Err(e) = write_frame(&mut stream, &frame) {
            sink_warn!(log, "[session {}] write failed: {} (closing)", id, e);
            handle.close();
            break;
        }
    }
    let _ = stream.shutdown(Shutdown::Both);
}
