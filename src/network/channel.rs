//! Realtime Channel Abstraction
//!
//! A backend opens a topic and hands back a [`ChannelLink`]: a bounded
//! outbound queue, a bounded inbound queue and the tasks pumping them. The
//! link owns those tasks and aborts them when closed or dropped, so no
//! background traffic outlives its session. A backend that needs to say
//! goodbye registers a shutdown signal; its writer then gets to finish the
//! farewell on its own, bounded by [`SHUTDOWN_GRACE`].

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::network::protocol::PlayerPosition;

/// Queue depth for each direction of a link.
pub const LINK_CAPACITY: usize = 64;

/// Upper bound on a backend's farewell after the shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Transport errors.
///
/// None of these are fatal to the local simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not reach the relay
    #[error("connect failed: {0}")]
    Connect(String),

    /// A frame could not be written
    #[error("send failed: {0}")]
    Send(String),

    /// A frame could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),

    /// The link is closed
    #[error("channel closed")]
    Closed,

    /// No link has been opened
    #[error("not connected")]
    NotConnected,
}

/// A backend capable of opening topic-scoped channels.
pub trait RealtimeChannel: Send + Sync + 'static {
    /// Open `topic` and start pumping messages.
    fn open(&self, topic: &str) -> impl Future<Output = Result<ChannelLink, TransportError>> + Send;
}

/// An open topic subscription.
#[derive(Debug)]
pub struct ChannelLink {
    outbound: mpsc::Sender<PlayerPosition>,
    inbound: mpsc::Receiver<PlayerPosition>,
    tasks: Vec<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ChannelLink {
    /// Assemble a link. `tasks` are aborted when the link closes.
    pub fn new(
        outbound: mpsc::Sender<PlayerPosition>,
        inbound: mpsc::Receiver<PlayerPosition>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self { outbound, inbound, tasks, shutdown: None }
    }

    /// Register a shutdown signal fired by [`close`](Self::close).
    ///
    /// The task listening on it is not in `tasks`; it must end itself
    /// within [`SHUTDOWN_GRACE`] once signalled.
    pub fn with_shutdown(mut self, shutdown: oneshot::Sender<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Cloneable handle for the broadcast loop.
    pub fn outbound(&self) -> mpsc::Sender<PlayerPosition> {
        self.outbound.clone()
    }

    /// Next inbound message if one is waiting.
    ///
    /// `Err(Closed)` once the backend has gone away and the queue is empty.
    pub fn try_recv(&mut self) -> Result<Option<PlayerPosition>, TransportError> {
        match self.inbound.try_recv() {
            Ok(position) => Ok(Some(position)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }

    /// Signal the farewell, then stop every pump task.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The listener may already be gone
            let _ = shutdown.send(());
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.inbound.close();
    }

    /// Check if any pump task is still running.
    pub fn is_open(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }
}

impl Drop for ChannelLink {
    fn drop(&mut self) {
        self.close();
    }
}
