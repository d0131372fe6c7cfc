//! WebSocket Relay Client
//!
//! Connects to a topic relay speaking the [`RelayMessage`] envelope:
//! `join` on open, `broadcast` for each position, `leave` on shutdown.
//! Binary mode sends [`PositionFrame`]s instead of JSON text; inbound frames
//! of either kind are accepted.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::network::channel::{ChannelLink, RealtimeChannel, TransportError, LINK_CAPACITY, SHUTDOWN_GRACE};
use crate::network::protocol::{PlayerPosition, PositionFrame, RelayMessage, POSITION_EVENT};

/// Encoding used for outbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// JSON text frames
    #[default]
    Json,
    /// bincode binary frames
    Binary,
}

/// Relay backend over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketChannel {
    url: String,
    format: WireFormat,
}

impl WebSocketChannel {
    /// Create a client for a relay URL (`ws://` or `wss://`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), format: WireFormat::Json }
    }

    /// Choose the outbound encoding.
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Relay URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Encode one outbound position.
fn encode(format: WireFormat, topic: &str, position: PlayerPosition) -> Result<Message, TransportError> {
    match format {
        WireFormat::Json => RelayMessage::position(topic, position)
            .to_json()
            .map(Message::Text)
            .map_err(|e| TransportError::Codec(e.to_string())),
        WireFormat::Binary => PositionFrame { topic: topic.to_string(), payload: position }
            .to_bytes()
            .map(Message::Binary)
            .map_err(|e| TransportError::Codec(e.to_string())),
    }
}

/// Decode one inbound frame into a position for `topic`, if it carries one.
fn decode(topic: &str, message: &Message) -> Result<Option<PlayerPosition>, TransportError> {
    match message {
        Message::Text(text) => match RelayMessage::from_json(text) {
            Ok(RelayMessage::Broadcast { topic: t, event, payload }) if t == topic && event == POSITION_EVENT => {
                Ok(Some(payload))
            }
            Ok(_) => Ok(None),
            Err(e) => Err(TransportError::Codec(e.to_string())),
        },
        Message::Binary(data) => {
            let frame = PositionFrame::from_bytes(data).map_err(|e| TransportError::Codec(e.to_string()))?;
            Ok((frame.topic == topic).then_some(frame.payload))
        }
        _ => Ok(None),
    }
}

impl RealtimeChannel for WebSocketChannel {
    async fn open(&self, topic: &str) -> Result<ChannelLink, TransportError> {
        info!(url = %self.url, topic, "Connecting to relay...");

        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let join = RelayMessage::Join { topic: topic.to_string() }
            .to_json()
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        write
            .send(Message::Text(join))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        info!(topic, "Relay connected");

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<PlayerPosition>(LINK_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<PlayerPosition>(LINK_CAPACITY);

        // Reader task
        let reader_topic = topic.to_string();
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Close(_)) => {
                        info!(topic = %reader_topic, "Relay closed connection");
                        break;
                    }
                    Ok(message) => match decode(&reader_topic, &message) {
                        Ok(Some(position)) => {
                            if inbound_tx.try_send(position).is_err() {
                                debug!(topic = %reader_topic, "Inbound queue full, dropping position");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(topic = %reader_topic, error = %e, "Failed to parse relay frame"),
                    },
                    Err(e) => {
                        warn!(topic = %reader_topic, error = %e, "Relay read error");
                        break;
                    }
                }
            }
            debug!(topic = %reader_topic, "Reader task ended");
        });

        // Writer task; not aborted by the link so it can leave politely
        let writer_topic = topic.to_string();
        let format = self.format;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            loop {
                let position = tokio::select! {
                    _ = &mut shutdown_rx => break,
                    next = outbound_rx.recv() => match next {
                        Some(position) => position,
                        None => break,
                    },
                };
                let message = match encode(format, &writer_topic, position) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(error = %e, "Dropping unencodable position");
                        continue;
                    }
                };
                if let Err(e) = write.send(message).await {
                    warn!(topic = %writer_topic, error = %e, "Relay send failed");
                    debug!(topic = %writer_topic, "Writer task ended");
                    return;
                }
            }

            let farewell = async {
                if let Ok(leave) = (RelayMessage::Leave { topic: writer_topic.clone() }).to_json() {
                    write.send(Message::Text(leave)).await?;
                }
                write.close().await
            };
            match tokio::time::timeout(SHUTDOWN_GRACE, farewell).await {
                Ok(Ok(())) => debug!(topic = %writer_topic, "Left relay topic"),
                Ok(Err(e)) => debug!(topic = %writer_topic, error = %e, "Relay gone before leave completed"),
                Err(_) => warn!(topic = %writer_topic, "Relay leave timed out"),
            }
            debug!(topic = %writer_topic, "Writer task ended");
        });

        Ok(ChannelLink::new(outbound_tx, inbound_rx, vec![reader]).with_shutdown(shutdown_tx))
    }
}
