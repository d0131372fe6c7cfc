//! Command Queue
//!
//! Input handlers, timers and network callbacks never touch simulation state.
//! They enqueue a [`Command`] through a cloneable [`CommandSender`]; the game
//! loop drains the queue once at the top of every tick.

use serde::{Serialize, Deserialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Player or host action applied at the next tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Flap (ignored unless flying)
    Flap,
    /// Return a finished match to idle
    Reset,
    /// Abandon the match; forfeits the running attempt
    Leave,
}

/// Cloneable handle for enqueueing commands.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    /// Enqueue a command. Returns false if the game loop is gone.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }

    /// Enqueue a flap.
    pub fn flap(&self) -> bool {
        self.send(Command::Flap)
    }
}

/// Single-consumer queue owned by the game loop.
#[derive(Debug)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Handle for producers.
    pub fn sender(&self) -> CommandSender {
        CommandSender { tx: self.tx.clone() }
    }

    /// Take every queued command in arrival order.
    pub fn drain(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(command) => commands.push(command),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Unreachable while we hold `tx`
                    warn!("Command queue disconnected");
                    break;
                }
            }
        }
        commands
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
