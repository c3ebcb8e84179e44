//! Game Server
//!
//! Binds the HTTP surface and the optional WebSocket push channel, runs the
//! idle-room sweep, and stops everything on one broadcast shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::narrator::{NarratorChain, SpeechService};
use crate::network::dispatch::handle_value;
use crate::network::http::{router, AppState};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::registry::RoomRegistry;
use crate::network::room::RoomEvent;
use crate::network::room_code::RoomCode;

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind a listener.
    #[error("Failed to bind {addr}: {source}")]
    BindFailed {
        /// Address tried.
        addr: SocketAddr,
        /// Cause.
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

type Subscription = (RoomCode, broadcast::Receiver<RoomEvent>);

/// The server.
pub struct GameServer {
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server with a fresh registry and configured providers.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(AppState {
            registry: Arc::new(RoomRegistry::new(config.registry.clone())),
            narrator: NarratorChain::from_config(&config.narrator),
            speech: SpeechService::from_config(&config.speech),
        });

        Self { config, state, shutdown_tx }
    }

    /// The room registry.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.state.registry.clone()
    }

    /// Sender that stops the server when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured addresses and run until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let http = bind(self.config.http_addr).await?;
        let ws = match self.config.ws_addr {
            Some(addr) => Some(bind(addr).await?),
            None => None,
        };
        self.run_with_listeners(http, ws).await
    }

    /// Run on already bound listeners until shutdown.
    #[instrument(skip_all)]
    pub async fn run_with_listeners(&self, http: TcpListener, ws: Option<TcpListener>) -> Result<(), ServerError> {
        info!("HTTP listening on {}", http.local_addr()?);

        let sweep_handle = tokio::spawn(Self::run_sweep_loop(
            self.state.registry.clone(),
            self.config.registry.sweep_interval,
            self.shutdown_tx.subscribe(),
        ));

        let ws_handle = ws.map(|listener| {
            let state = self.state.clone();
            let shutdown_tx = self.shutdown_tx.clone();
            tokio::spawn(async move {
                Self::run_ws_listener(listener, state, shutdown_tx).await;
            })
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let app = router(self.state.clone());
        let result = axum::serve(http, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Shutdown signal received");
            })
            .await;

        sweep_handle.abort();
        if let Some(handle) = ws_handle {
            let _ = handle.await;
        }

        result.map_err(ServerError::from)
    }

    // =========================================================================
    // WEBSOCKET
    // =========================================================================

    async fn run_ws_listener(listener: TcpListener, state: Arc<AppState>, shutdown_tx: broadcast::Sender<()>) {
        if let Ok(addr) = listener.local_addr() {
            info!("WebSocket push channel listening on {}", addr);
        }
        let mut shutdown_rx = shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New connection from {}", addr);
                            Self::handle_connection(stream, addr, state.clone(), shutdown_tx.subscribe());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    }

    /// Handle one WebSocket connection.
    fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        state: Arc<AppState>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut subscription: Option<Subscription> = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error {
                                            code: ErrorCode::Validation,
                                            message: "Invalid message format".to_string(),
                                        }).await;
                                        continue;
                                    }
                                };
                                Self::handle_client_message(client_msg, &state, &mut subscription, &msg_tx).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    event = next_event(&mut subscription) => {
                        let Some((code, _)) = &subscription else { continue };
                        let code = code.clone();
                        match event {
                            Ok(event) => {
                                let closed = event == RoomEvent::Closed;
                                let _ = msg_tx.send(ServerMessage::Event { room_code: code, event }).await;
                                if closed {
                                    subscription = None;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                debug!("Subscriber {} lagged {} events on room {}", addr, n, code);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                // Room was swept or deleted
                                let _ = msg_tx.send(ServerMessage::Event { room_code: code, event: RoomEvent::Closed }).await;
                                subscription = None;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown).await;
                        break;
                    }
                }
            }

            // Let queued messages flush
            drop(msg_tx);
            let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;
            debug!("Client {} cleaned up", addr);
        });
    }

    async fn handle_client_message(
        msg: ClientMessage,
        state: &AppState,
        subscription: &mut Option<Subscription>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let reply = match msg {
            ClientMessage::Request { id, request } => {
                let (status, body) = handle_value(&state.registry, request).await;
                ServerMessage::Response { id, status, body }
            }
            ClientMessage::Subscribe { room_code } => {
                let Some(code) = RoomCode::parse(&room_code) else {
                    let _ = sender.send(ServerMessage::Error {
                        code: ErrorCode::Validation,
                        message: format!("Invalid room code: {}", room_code),
                    }).await;
                    return;
                };
                match state.registry.subscribe(&code).await {
                    Ok(rx) => {
                        *subscription = Some((code.clone(), rx));
                        ServerMessage::Subscribed { room_code: code }
                    }
                    Err(e) => ServerMessage::Error { code: e.code(), message: e.to_string() },
                }
            }
            ClientMessage::Unsubscribe => {
                *subscription = None;
                return;
            }
            ClientMessage::Ping { timestamp } => ServerMessage::Pong {
                timestamp,
                server_time: Utc::now().timestamp_millis().max(0) as u64,
            },
        };
        let _ = sender.send(reply).await;
    }

    // =========================================================================
    // SWEEP
    // =========================================================================

    /// Delete idle rooms on a fixed interval.
    async fn run_sweep_loop(registry: Arc<RoomRegistry>, every: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let swept = registry.sweep_idle(Instant::now()).await;
                    for code in swept {
                        debug!("Cleaned up inactive room {}", code);
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::BindFailed { addr, source })
}

/// Next event of the current subscription; pending forever without one.
async fn next_event(subscription: &mut Option<Subscription>) -> Result<RoomEvent, broadcast::error::RecvError> {
    match subscription {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}
