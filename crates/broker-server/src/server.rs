// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker server core implementation: two TCP listeners (control and
//! broadcast) sharing one locked `BrokerState`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use broker_core::dispatcher::{dispatch, Effect};
use broker_core::heartbeat;
use broker_core::protocol::{Reply, BROKER_CMD};
use broker_core::BrokerState;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::ControlConnection;
use crate::relay;
use crate::relay::{BroadcastEvent, BroadcastHub, RelayStats};

/// Ownership-aware pub/sub broker server.
#[derive(Clone)]
pub struct Server {
    config: Arc<ServerConfig>,
    state: Arc<Mutex<BrokerState>>,
    hub: Arc<Mutex<BroadcastHub>>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BrokerState::new())),
            hub: Arc::new(Mutex::new(BroadcastHub::new())),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Bind both endpoints and run until shut down.
    pub async fn run(&self) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        let control_addr = format!("{}:{}", self.config.bind_address, self.config.control_port);
        let broadcast_addr = format!(
            "{}:{}",
            self.config.bind_address, self.config.broadcast_port
        );

        let control_listener = TcpListener::bind(&control_addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        let broadcast_listener = TcpListener::bind(&broadcast_addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        info!("control endpoint listening on {}", control_addr);
        info!("broadcast endpoint listening on {}", broadcast_addr);

        self.spawn_heartbeat_ticker();

        loop {
            tokio::select! {
                result = control_listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!("control connection from {}", peer_addr);
                            let server = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_control_connection(stream, peer_addr).await {
                                    warn!("control connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => warn!("control accept error: {}", e),
                    }
                }
                result = broadcast_listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!("broadcast connection from {}", peer_addr);
                            let hub = self.hub.clone();
                            tokio::spawn(async move {
                                Self::handle_broadcast_connection(stream, hub).await;
                            });
                        }
                        Err(e) => warn!("broadcast accept error: {}", e),
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn spawn_heartbeat_ticker(&self) {
        let state = self.state.clone();
        let hub = self.hub.clone();
        let interval = self.config.heartbeat_interval();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let tick = {
                            let mut s = state.lock();
                            heartbeat::tick(&mut s)
                        };
                        if !tick.reaped.is_empty() {
                            info!("reaped {} unresponsive client(s)", tick.reaped.len());
                        }
                        for effect in tick.effects {
                            Self::apply_broadcast_effect(&hub, effect).await;
                        }
                    }
                    _ = shutdown.notified() => {
                        debug!("heartbeat ticker shutting down");
                        break;
                    }
                }
            }
        });
    }

    async fn handle_control_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let mut conn = ControlConnection::new(stream, peer_addr, self.config.max_message_size);

        loop {
            match conn.read_request().await {
                Ok(Some(Some(request))) => {
                    let is_shutdown_request = matches!(request, broker_core::protocol::Request::Shutdown);
                    let (reply, effects) = {
                        let mut state = self.state.lock();
                        dispatch(&mut state, request)
                    };
                    conn.send_reply(&reply).await?;
                    for effect in effects {
                        self.apply_effect(effect).await;
                    }
                    if is_shutdown_request {
                        break;
                    }
                }
                Ok(Some(None)) => {
                    conn.send_reply(&Reply::Unknown { result: false }).await?;
                }
                Ok(None) => {
                    debug!("control connection closed: {}", peer_addr);
                    break;
                }
                Err(e) => {
                    warn!("control read error from {}: {}", peer_addr, e);
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_broadcast_connection(mut stream: TcpStream, hub: Arc<Mutex<BroadcastHub>>) {
        use tokio::io::AsyncWriteExt;

        let (tx, mut rx) = mpsc::channel::<BroadcastEvent>(128);
        let id = hub.lock().register(tx);

        while let Some(event) = rx.recv().await {
            let topic_ok = broker_core::protocol::write_frame(
                &mut stream,
                event.topic.as_bytes(),
                usize::MAX,
            )
            .await
            .is_ok();
            let payload_ok = topic_ok
                && broker_core::protocol::write_frame(&mut stream, &event.payload, usize::MAX)
                    .await
                    .is_ok();
            if !payload_ok || stream.flush().await.is_err() {
                break;
            }
        }

        hub.lock().unregister(id);
    }

    async fn apply_effect(&self, effect: Effect) {
        match effect {
            Effect::Shutdown => self.shutdown(),
            broadcast => Self::apply_broadcast_effect(&self.hub, broadcast).await,
        }
    }

    async fn apply_broadcast_effect(hub: &Arc<Mutex<BroadcastHub>>, effect: Effect) {
        if let Effect::Broadcast { topic, content } = effect {
            let payload = match serde_json::to_vec(&content) {
                Ok(p) => p,
                Err(e) => {
                    warn!("failed to encode broadcast payload: {}", e);
                    return;
                }
            };
            if topic == BROKER_CMD {
                debug!("broadcasting heartbeat");
            }
            // Snapshot the sender list and release the lock before
            // fanning out: `fan_out` uses `try_send`, so it never
            // suspends, but a stalled subscriber must not hold up
            // `register`/`unregister` on other connections either.
            let senders = hub.lock().senders();
            let (sent, dropped) = relay::fan_out(&senders, &BroadcastEvent { topic, payload });
            hub.lock().record_broadcast(sent, dropped);
            debug!(
                "broadcast delivered to {} subscriber(s), {} dropped",
                sent, dropped
            );
        }
    }

    /// Signal the server to stop accepting connections and exit `run`.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> broker_core::Stats {
        self.state.lock().stats()
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.hub.lock().stats()
    }
}

/// Server error types.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("bind error: {0}")]
    Bind(String),
    #[error("server already running")]
    AlreadyRunning,
    #[error(transparent)]
    Protocol(#[from] broker_core::ProtocolError),
}
