use std::net::{Shutdown, TcpStream};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::Sender;

use crate::relay::peer::{Peer, PeerId};
use crate::relay::relay_error::RelayError;
use crate::relay::session_state::SessionState;
use crate::utils::lock_or_recover;
use crate::websocket::Frame;

/// Shared, send-side view of one session.
///
/// Rooms hold it as an `Arc<dyn Peer>`; sending only queues a frame for the
/// session's writer thread, so a slow socket never blocks a broadcast.
pub struct SessionHandle {
    id: PeerId,
    state: AtomicU8,
    /// Taken on close; the writer thread drains what is queued and exits.
    to_writer: Mutex<Option<Sender<Frame>>>,
    /// Clone of the socket used only to interrupt the reader.
    socket: TcpStream,
}

impl SessionHandle {
    pub fn new(id: PeerId, socket: TcpStream, to_writer: Sender<Frame>) -> Self {
        Self {
            id,
            state: AtomicU8::new(SessionState::Connecting.as_u8()),
            to_writer: Mutex::new(Some(to_writer)),
            socket,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Forward-only transition before the session is open.
    ///
    /// Returns false if the session is already closing.
    pub(crate) fn advance(&self, next: SessionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                let cur = SessionState::from_u8(cur);
                (!cur.is_terminal() && cur.as_u8() < next.as_u8()).then_some(next.as_u8())
            })
            .is_ok()
    }

    /// Queue a frame for the writer. Only an open session accepts frames.
    pub fn send_frame(&self, frame: Frame) -> Result<(), RelayError> {
        if !self.is_open() {
            return Err(RelayError::PeerClosed(self.id));
        }

        let queued = lock_or_recover(&self.to_writer)
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok());

        if queued {
            Ok(())
        } else {
            // The writer is gone; nothing more can reach this client.
            self.close();
            Err(RelayError::PeerClosed(self.id))
        }
    }

    /// Abort: stop accepting frames and shut the socket so a blocked read
    /// returns at once. Only the first caller gets `true`.
    pub fn close(&self) -> bool {
        if !self.enter_closing() {
            return false;
        }
        lock_or_recover(&self.to_writer).take();
        let _ = self.socket.shutdown(Shutdown::Both);
        true
    }

    /// Orderly close: queue `reply` (the close frame) as the last frame and let
    /// the writer shut the socket once it has been written.
    pub fn close_with(&self, reply: Frame) -> bool {
        if !self.enter_closing() {
            return false;
        }
        if let Some(tx) = lock_or_recover(&self.to_writer).take() {
            let _ = tx.send(reply);
        }
        true
    }

    pub(crate) fn mark_closed(&self) {
        self.state
            .store(SessionState::Closed.as_u8(), Ordering::Release);
    }

    fn enter_closing(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (!SessionState::from_u8(cur).is_terminal())
                    .then_some(SessionState::Closing.as_u8())
            })
            .is_ok()
    }
}

impl Peer for SessionHandle {
    fn id(&self) -> PeerId {
        self.id
    }

    fn send_text(&self, text: &str) -> Result<(), RelayError> {
        self.send_frame(Frame::text(text))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Connected (server-side, client-side) socket pair on loopback.
    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn frames_are_refused_until_open() {
        let (server, _client) = socket_pair();
        let (tx, rx) = mpsc::channel();
        let handle = SessionHandle::new(7, server, tx);

        assert!(matches!(
            handle.send_text("early"),
            Err(RelayError::PeerClosed(7))
        ));
        assert!(handle.advance(SessionState::Handshaking));
        assert!(handle.advance(SessionState::Open));
        assert!(!handle.advance(SessionState::Handshaking), "no going back");

        handle.send_text("hi").unwrap();
        assert_eq!(rx.try_recv().unwrap(), Frame::text("hi"));
    }

    #[test]
    fn close_happens_once_and_interrupts_reads() {
        let (server, mut client) = socket_pair();
        let (tx, rx) = mpsc::channel();
        let handle = SessionHandle::new(1, server, tx);
        handle.advance(SessionState::Open);

        assert!(handle.close());
        assert!(!handle.close());
        assert!(!handle.close_with(Frame::close(1000)));
        assert_eq!(handle.state(), SessionState::Closing);

        // Writer channel is disconnected and the peer sees EOF.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).unwrap(), 0);

        assert!(handle.send_text("late").is_err());
        handle.mark_closed();
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[test]
    fn graceful_close_queues_reply_last() {
        let (server, _client) = socket_pair();
        let (tx, rx) = mpsc::channel();
        let handle = SessionHandle::new(1, server, tx);
        handle.advance(SessionState::Open);

        handle.send_text("before").unwrap();
        assert!(handle.close_with(Frame::close(1000)));

        assert_eq!(rx.recv().unwrap(), Frame::text("before"));
        assert_eq!(rx.recv().unwrap(), Frame::close(1000));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn dead_writer_closes_the_session() {
        let (server, _client) = socket_pair();
        let (tx, rx) = mpsc::channel();
        let handle = SessionHandle::new(3, server, tx);
        handle.advance(SessionState::Open);
        drop(rx);

        assert!(handle.send_text("lost").is_err());
        assert_eq!(handle.state(), SessionState::Closing);
    }
}
