use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audit::AuditLog;
use crate::config::{RelayConfig, WebSocketSettings};
use crate::log::log_sink::LogSink;
use crate::relay::peer::PeerId;
use crate::relay::relay::Relay;
use crate::relay::session::spawn_session;
use crate::{sink_info, sink_warn};

/// Listening socket plus the shared relay state every session uses.
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    settings: WebSocketSettings,
    room_id: String,
    log: Arc<dyn LogSink>,
    stop: Arc<AtomicBool>,
}

/// Asks a running `RelayServer` to stop accepting connections.
#[derive(Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl StopHandle {
    /// Set the stop flag and poke the listener so a blocked `accept` returns.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.wake_addr);
    }
}

impl RelayServer {
    /// Bind the listening socket. Nothing is accepted until [`run`](Self::run).
    pub fn bind(config: &RelayConfig, log: Arc<dyn LogSink>) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)?;
        let audit = Arc::new(AuditLog::new(log.clone()));
        // Plain ws:// only, so clients are always told the channel is unencrypted.
        let relay = Arc::new(Relay::new(audit, false, log.clone()));

        sink_info!(
            log,
            "signaling relay listening on ws://{} (room {})",
            listener.local_addr()?,
            config.default_room
        );
        sink_warn!(
            log,
            "relay is unencrypted and logs SDP and ICE metadata; use only on trusted networks"
        );
        if config.encrypted {
            sink_warn!(log, "encrypted=true requested but TLS is not implemented; serving plain ws://");
        }

        Ok(Self {
            listener,
            relay,
            settings: config.websocket.clone(),
            room_id: config.default_room.clone(),
            log,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn relay(&self) -> Arc<Relay> {
        self.relay.clone()
    }

    pub fn audit(&self) -> Arc<AuditLog> {
        self.relay.audit().clone()
    }

    pub fn stop_handle(&self) -> io::Result<StopHandle> {
        Ok(StopHandle {
            stop: self.stop.clone(),
            wake_addr: wake_addr(self.listener.local_addr()?),
        })
    }

    /// Blocking accept loop: one session thread per connection.
    ///
    /// Returns after a [`StopHandle`] fires; sessions already running are left
    /// to finish on their own.
    pub fn run(self) -> io::Result<()> {
        let mut next_id: PeerId = 1;

        for stream in self.listener.incoming() {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(
                        self.log,
                        "incoming TCP accept failed: {:?} (continuing to accept)",
                        e
                    );
                    continue;
                }
            };

            let id = next_id;
            next_id += 1;
            let peer_addr = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".into());
            sink_info!(self.log, "accepted client {} from {}", id, peer_addr);

            if let Err(e) = spawn_session(
                id,
                stream,
                self.room_id.clone(),
                self.relay.clone(),
                self.settings.clone(),
                self.log.clone(),
            ) {
                sink_warn!(self.log, "could not start session {}: {}", id, e);
            }
        }

        sink_info!(self.log, "relay stopped: {}", self.relay.audit().summary());
        Ok(())
    }
}

/// Address to connect to in order to wake our own listener.
fn wake_addr(local: SocketAddr) -> SocketAddr {
    match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local.port())
        }
        _ => local,
    }
}
