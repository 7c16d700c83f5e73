// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A single publisher record within a topic's ordered sequence.

use serde_json::Value;

use super::history::HistoryBuffer;

/// One publisher's registration for a topic.
#[derive(Debug, Clone)]
pub struct Publisher {
    pub addr: String,
    pub own_str: i32,
    pub history: HistoryBuffer,
}

impl Publisher {
    pub fn new(addr: impl Into<String>, own_str: i32, history_capacity: usize) -> Self {
        Self {
            addr: addr.into(),
            own_str,
            history: HistoryBuffer::new(history_capacity),
        }
    }

    pub fn record_publish(&mut self, content: Value) {
        self.history.push(content);
    }
}
