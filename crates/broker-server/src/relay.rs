// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fan-out of broadcast events to every connected subscriber.
//!
//! Subscribers on the broadcast endpoint are anonymous — there is no
//! per-client handshake, only a bare TCP connect — so unlike a relay
//! keyed by participant identity, connections here are keyed by a
//! locally assigned id whose only purpose is letting a dead connection
//! remove itself.

use std::collections::HashMap;

use tokio::sync::mpsc;

/// One broadcast event: topic name, then the JSON-encoded payload, sent
/// as two length-prefixed frames.
#[derive(Debug, Clone)]
pub struct BroadcastEvent {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default, Clone)]
pub struct RelayStats {
    pub events_sent: u64,
    pub deliveries: u64,
    pub send_errors: u64,
}

/// Registry of connected broadcast subscribers.
#[derive(Default)]
pub struct BroadcastHub {
    connections: HashMap<u64, mpsc::Sender<BroadcastEvent>>,
    next_id: u64,
    stats: RelayStats,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new broadcast subscriber connection, returning its id
    /// (used to unregister it on disconnect).
    pub fn register(&mut self, tx: mpsc::Sender<BroadcastEvent>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(id, tx);
        id
    }

    pub fn unregister(&mut self, id: u64) {
        self.connections.remove(&id);
    }

    /// Snapshot of every connected subscriber's sender, for a caller that
    /// wants to fan a broadcast out without holding the hub locked for
    /// the whole send loop. `mpsc::Sender` clones are cheap (an `Arc`
    /// bump), so this is just a point-in-time copy of the connection
    /// list.
    pub fn senders(&self) -> Vec<mpsc::Sender<BroadcastEvent>> {
        self.connections.values().cloned().collect()
    }

    /// Record the outcome of a fan-out done via a `senders()` snapshot.
    pub fn record_broadcast(&mut self, sent: usize, dropped: usize) {
        self.stats.events_sent += 1;
        self.stats.deliveries += sent as u64;
        self.stats.send_errors += dropped as u64;
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats.clone()
    }
}

/// Fan `event` out to every sender in `senders`, matching spec.md §5's
/// PUB-socket contract: "non-blocking; may drop if high-water mark
/// exceeded — acceptable for pub/sub semantics." A full subscriber
/// channel means that subscriber is behind; it loses this event rather
/// than stalling every other subscriber (or the caller) behind it.
/// Returns `(delivered, dropped)`.
pub fn fan_out(senders: &[mpsc::Sender<BroadcastEvent>], event: &BroadcastEvent) -> (usize, usize) {
    let mut sent = 0;
    let mut dropped = 0;
    for tx in senders {
        match tx.try_send(event.clone()) {
            Ok(()) => sent += 1,
            Err(_) => dropped += 1,
        }
    }
    (sent, dropped)
}
