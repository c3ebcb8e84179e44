//! WebSocket room subscription.
//!
//! Optional push channel: the server announces new snapshots so a device
//! can poll right away instead of waiting out the interval.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use werewolf::network::protocol::{ClientMessage, ServerMessage};
use werewolf::network::room::RoomEvent;
use werewolf::network::room_code::RoomCode;

use crate::transport::TransportError;

/// Live subscription to one room's events.
pub struct RoomSubscription {
    room_code: RoomCode,
    events: mpsc::Receiver<RoomEvent>,
    outgoing: mpsc::Sender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RoomSubscription {
    /// Connect to `url` and subscribe to `room_code`. Fails if the server
    /// rejects the subscription.
    pub async fn connect(url: &str, room_code: &RoomCode) -> Result<Self, TransportError> {
        info!("Connecting to {}...", url);
        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = ClientMessage::Subscribe { room_code: room_code.to_string() }.to_json()?;
        write.send(Message::Text(subscribe)).await?;

        // First reply settles the subscription
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text)? {
                    ServerMessage::Subscribed { .. } => break,
                    ServerMessage::Error { code, message } => {
                        return Err(TransportError::Rejected { code, message });
                    }
                    other => debug!("Ignoring {:?} before subscription", other),
                },
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(_)) => {}
            }
        }
        info!("Subscribed to room {}", room_code);

        let (event_tx, events) = mpsc::channel::<RoomEvent>(64);
        let (outgoing, mut outgoing_rx) = mpsc::channel::<String>(16);

        let code = room_code.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                        Ok(ServerMessage::Event { room_code, event }) if room_code == code => {
                            let closed = event == RoomEvent::Closed;
                            if event_tx.send(event).await.is_err() || closed {
                                break;
                            }
                        }
                        Ok(ServerMessage::Shutdown) => {
                            info!("Server shutting down");
                            break;
                        }
                        Ok(other) => debug!("Received: {:?}", other),
                        Err(e) => warn!("Failed to parse server message: {} - {}", e, text),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Server closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!("WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            debug!("Reader task ended");
        });

        let writer = tokio::spawn(async move {
            while let Some(json) = outgoing_rx.recv().await {
                if let Err(e) = write.send(Message::Text(json)).await {
                    warn!("Failed to send message: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        Ok(Self { room_code: room_code.clone(), events, outgoing, reader, writer })
    }

    /// Subscribed room.
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    /// Next event; `None` once the channel is gone.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }

    /// Send a keep-alive ping.
    pub async fn ping(&self, timestamp: u64) -> Result<(), TransportError> {
        let json = ClientMessage::Ping { timestamp }.to_json()?;
        self.outgoing.send(json).await.map_err(|_| TransportError::Closed)
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
