// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control-endpoint connection: one request, one reply, repeat.

use std::net::SocketAddr;

use broker_core::protocol::{self, read_frame, write_frame, Reply, Request};
use broker_core::ProtocolError;
use tokio::net::TcpStream;

pub struct ControlConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    max_message_size: usize,
}

impl ControlConnection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, max_message_size: usize) -> Self {
        Self {
            stream,
            peer_addr,
            max_message_size,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Read one request. `Ok(None)` on a clean disconnect between
    /// requests; `Ok(Some(None))` when the frame parsed but carried an
    /// unrecognized `type` (the caller replies `Reply::Unknown`).
    pub async fn read_request(&mut self) -> Result<Option<Option<Request>>, ProtocolError> {
        let body = read_frame(&mut self.stream, self.max_message_size).await?;
        Ok(body.map(|b| protocol::parse_request(&b)))
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> Result<(), ProtocolError> {
        let body = protocol::encode_reply(reply)?;
        write_frame(&mut self.stream, &body, self.max_message_size).await
    }
}
