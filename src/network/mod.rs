//! Network Layer
//!
//! Realtime position sync between participants of a shared match.
//! This layer is **non-deterministic** - all game logic runs through `game/`,
//! and nothing here can change a local score.
//!
//! ## Module Structure
//!
//! - `protocol`: Position payload and relay envelope
//! - `channel`: Backend trait and the link it hands out
//! - `memory`: In-process hub backend
//! - `websocket`: WebSocket relay backend
//! - `peers`: Latest state per peer
//! - `transport`: Broadcast loop, polling and teardown
//! - `interpolation`: Ghost smoothing
//! - `session`: Game, transport, ghosts and match service together

pub mod protocol;
pub mod channel;
pub mod memory;
pub mod websocket;
pub mod peers;
pub mod transport;
pub mod interpolation;
pub mod session;

pub use protocol::{PlayerPosition, RelayMessage, PositionFrame, positions_topic, POSITION_EVENT};
pub use channel::{RealtimeChannel, ChannelLink, TransportError};
pub use memory::MemoryHub;
pub use websocket::{WebSocketChannel, WireFormat};
pub use peers::{PeerRegistry, PeerState, PeerUpdate};
pub use transport::{SyncTransport, TransportConfig, TransportStats, PollSummary};
pub use interpolation::{RemoteEntityInterpolator, InterpolatorConfig, Ghost};
pub use session::{MultiplayerSession, SessionConfig, SessionError, Standing};
