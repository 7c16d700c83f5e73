// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Combined broker state: clients + topics + counters.

use super::client_table::ClientTable;
use super::topic::TopicRegistry;

/// Missed-heartbeat budget a client starts (and is reset to) with.
pub const INIT_COUNT: i32 = 2;

/// Interval between heartbeat ticks, in milliseconds (spec.md §5).
pub const HEARTBEAT_MS: u64 = 1000;

/// All broker-side registries, mutated only through `dispatch` or the
/// heartbeat ticker. No I/O lives here; this is the part of the broker
/// that unit tests exercise directly without a running server.
#[derive(Debug, Default)]
pub struct BrokerState {
    pub clients: ClientTable,
    pub topics: TopicRegistry,
    /// Total requests dispatched since startup, exposed via `stats`.
    pub requests_served: u64,
    /// Total broadcast events emitted (publishes + heartbeats).
    pub broadcasts_sent: u64,
}

impl BrokerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all trace of a client: its registration and every
    /// publisher record it owns, across all topics (spec.md I1).
    pub fn reap(&mut self, addr: &str) {
        self.clients.remove(addr);
        self.topics.remove_all_for_addr(addr);
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub client_count: usize,
    pub topic_count: usize,
    pub requests_served: u64,
    pub broadcasts_sent: u64,
}

impl BrokerState {
    pub fn stats(&self) -> Stats {
        Stats {
            client_count: self.clients.len(),
            topic_count: self.topics.topic_names().count(),
            requests_served: self.requests_served,
            broadcasts_sent: self.broadcasts_sent,
        }
    }
}
