//! Room-based signaling relay over WebSocket.
//!
//! `server` accepts TCP clients and spawns one `session` per connection.
//! Each session upgrades the connection, joins the configured room and hands
//! every text message to the shared `Relay`, which audits it and fans it out to
//! the other members of the room.

pub mod message_format_error;
pub mod peer;
#[allow(clippy::module_inception)]
pub mod relay;
pub mod relay_error;
pub mod room;
pub mod room_registry;
pub mod run;
pub mod server;
pub mod session;
pub mod session_handle;
pub mod session_state;
pub mod signaling_message;

pub use message_format_error::MessageFormatError;
pub use peer::{Peer, PeerId};
pub use relay::Relay;
pub use relay_error::RelayError;
pub use room::{BroadcastReport, Room, RoomId};
pub use room_registry::RoomRegistry;
pub use run::{load_config, run_relay, run_relay_with_log};
pub use server::{RelayServer, StopHandle};
pub use session::spawn_session;
pub use session_handle::SessionHandle;
pub use session_state::SessionState;
pub use signaling_message::{MessageKind, SignalingMessage};
