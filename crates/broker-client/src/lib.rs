// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client runtime for the ownership-aware pub/sub broker.
//!
//! A [`BrokerClient`] opens two connections, mirroring the broker's two
//! endpoints: a control connection for request/reply calls
//! (`client_reg`, `pub_reg`, `sub_reg`, `pub`, `disconnect`, `ping`,
//! `shutdown`) and a broadcast connection the client reads continuously.
//! A background task owns the broadcast connection, answers the
//! broker's heartbeats with a `ping` on the control connection
//! automatically, and fans every other event out to
//! [`BrokerClient::notify`] callers through a `tokio::sync::broadcast`
//! channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use broker_core::protocol::{read_frame, write_frame, BrokerCmd, Reply, Request, BROKER_CMD};
use broker_core::ProtocolError;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const NOTIFY_CHANNEL_CAPACITY: usize = 256;

/// One event received on the broadcast connection.
#[derive(Debug, Clone)]
pub struct Notification {
    pub topic: String,
    pub content: Value,
}

pub struct BrokerClient {
    addr: String,
    control: Arc<Mutex<TcpStream>>,
    events: broadcast::Sender<Notification>,
    max_message_size: usize,
    _reader_task: tokio::task::JoinHandle<()>,
}

impl BrokerClient {
    /// Connect to the broker's control and broadcast endpoints and
    /// register as a client. `addr` is this client's own address, used
    /// as its identity in every subsequent request, matching how the
    /// broker keys publishers, subscribers and liveness by address.
    pub async fn connect(
        addr: impl Into<String>,
        control_addr: SocketAddr,
        broadcast_addr: SocketAddr,
    ) -> Result<Self, ClientError> {
        let addr = addr.into();
        let control = Arc::new(Mutex::new(TcpStream::connect(control_addr).await?));
        let broadcast_stream = TcpStream::connect(broadcast_addr).await?;

        let (events_tx, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);

        send_request(
            &control,
            DEFAULT_MAX_MESSAGE_SIZE,
            Request::ClientReg { addr: addr.clone() },
        )
        .await?;

        let reader_task = spawn_broadcast_reader(
            broadcast_stream,
            events_tx.clone(),
            control.clone(),
            addr.clone(),
            DEFAULT_MAX_MESSAGE_SIZE,
        );

        Ok(Self {
            addr,
            control,
            events: events_tx,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            _reader_task: reader_task,
        })
    }

    async fn request(&self, request: Request) -> Result<Reply, ClientError> {
        send_request(&self.control, self.max_message_size, request).await
    }

    /// Register as a publisher for `topic` with the given ownership
    /// strength and durability depth.
    pub async fn register_pub(
        &self,
        topic: impl Into<String>,
        own_str: i32,
        history_cnt: usize,
    ) -> Result<bool, ClientError> {
        let reply = self
            .request(Request::PubReg {
                addr: self.addr.clone(),
                topic: topic.into(),
                own_str,
                history_cnt,
            })
            .await?;
        match reply {
            Reply::PubReg { result } => Ok(result),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Subscribe to `topic`, returning the publisher's retained history
    /// (if any publisher is currently registered for it).
    pub async fn register_sub(
        &self,
        topic: impl Into<String>,
        history_cnt: usize,
    ) -> Result<Option<Vec<Value>>, ClientError> {
        let reply = self
            .request(Request::SubReg {
                topic: topic.into(),
                history_cnt,
            })
            .await?;
        match reply {
            Reply::SubReg {
                result: true,
                history,
            } => Ok(Some(history.unwrap_or_default())),
            Reply::SubReg { result: false, .. } => Ok(None),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Publish `content` on `topic`. Only takes effect broker-side if
    /// this client is currently the strongest publisher for the topic.
    pub async fn publish(
        &self,
        topic: impl Into<String>,
        content: Value,
    ) -> Result<bool, ClientError> {
        let reply = self
            .request(Request::Publish {
                addr: self.addr.clone(),
                topic: topic.into(),
                content,
            })
            .await?;
        match reply {
            Reply::Publish { result } => Ok(result),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Withdraw this client's publisher registration for `topic`.
    /// Idempotent: succeeds even if no such registration exists.
    pub async fn disconnect(&self, topic: impl Into<String>) -> Result<(), ClientError> {
        let reply = self
            .request(Request::Disconnect {
                addr: self.addr.clone(),
                topic: topic.into(),
            })
            .await?;
        match reply {
            Reply::Ack => Ok(()),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Send an explicit liveness ping. The background broadcast reader
    /// already does this automatically on every heartbeat; this is for
    /// callers that want to refresh liveness independent of that cadence.
    pub async fn ping(&self) -> Result<bool, ClientError> {
        let reply = self
            .request(Request::Ping {
                addr: self.addr.clone(),
            })
            .await?;
        match reply {
            Reply::Ping { result } => Ok(result),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Ask the broker to shut down.
    pub async fn shutdown_broker(&self) -> Result<bool, ClientError> {
        let reply = self.request(Request::Shutdown).await?;
        match reply {
            Reply::Shutdown { result } => Ok(result),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Wait for the next broadcast event on `topic`. `timeout = None`
    /// blocks indefinitely, matching spec.md §4.5's `timeout_ms=0`
    /// sentinel; `Some(d)` returns `Ok(None)` once `d` elapses with no
    /// matching event. Non-matching events (including heartbeats, which
    /// the background reader already answers on its own) are drained
    /// in-place without resetting the deadline, so a burst of unrelated
    /// traffic can't extend a bounded wait past what the caller asked for.
    pub async fn notify(
        &self,
        topic: impl AsRef<str>,
        timeout: Option<Duration>,
    ) -> Result<Option<Notification>, ClientError> {
        let topic = topic.as_ref();
        let mut rx = self.events.subscribe();
        let deadline = timeout.map(|d| tokio::time::Instant::now() + d);
        loop {
            let recv = rx.recv();
            let outcome = match deadline {
                None => Ok(recv.await),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    tokio::time::timeout(remaining, recv).await
                }
            };
            match outcome {
                Ok(Ok(event)) if event.topic == topic => return Ok(Some(event)),
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(ClientError::ConnectionClosed)
                }
                Err(_) => return Ok(None),
            }
        }
    }
}

/// Write one request and read back its reply. Shared between the public
/// API (under `&self`) and the background reader task's auto-ping,
/// which has no `BrokerClient` to call through.
async fn send_request(
    control: &Arc<Mutex<TcpStream>>,
    max_message_size: usize,
    request: Request,
) -> Result<Reply, ClientError> {
    let body = serde_json::to_vec(&request)?;
    let mut stream = control.lock().await;
    write_frame(&mut *stream, &body, max_message_size).await?;
    let reply_body = read_frame(&mut *stream, max_message_size)
        .await?
        .ok_or(ClientError::ConnectionClosed)?;
    Ok(serde_json::from_slice(&reply_body)?)
}

fn spawn_broadcast_reader(
    mut stream: TcpStream,
    events_tx: broadcast::Sender<Notification>,
    control: Arc<Mutex<TcpStream>>,
    addr: String,
    max_message_size: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let topic = match read_frame(&mut stream, max_message_size).await {
                Ok(Some(bytes)) => match String::from_utf8(bytes) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("broadcast reader: malformed topic frame: {}", e);
                        break;
                    }
                },
                Ok(None) => {
                    debug!("broadcast connection closed by broker");
                    break;
                }
                Err(e) => {
                    warn!("broadcast reader: frame error: {}", e);
                    break;
                }
            };

            let payload = match read_frame(&mut stream, max_message_size).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(e) => {
                    warn!("broadcast reader: payload frame error: {}", e);
                    break;
                }
            };

            let content: Value = match serde_json::from_slice(&payload) {
                Ok(v) => v,
                Err(e) => {
                    warn!("broadcast reader: malformed payload JSON: {}", e);
                    continue;
                }
            };

            if topic == BROKER_CMD {
                if serde_json::from_value::<BrokerCmd>(content).is_ok() {
                    if let Err(e) = send_request(
                        &control,
                        max_message_size,
                        Request::Ping { addr: addr.clone() },
                    )
                    .await
                    {
                        warn!("failed to answer heartbeat with ping: {}", e);
                    }
                }
                continue;
            }

            let _ = events_tx.send(Notification { topic, content });
        }
    })
}

/// Errors returned by [`BrokerClient`] calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed by broker")]
    ConnectionClosed,
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}
