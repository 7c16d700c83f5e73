// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-publisher bounded FIFO history (durability) buffer.

use std::collections::VecDeque;

use serde_json::Value;

/// Fixed-capacity FIFO of published contents. Append to a full buffer
/// evicts the oldest entry (spec.md I3). Capacity 0 means no retention:
/// append is a no-op and the buffer stays empty (spec.md §9 open
/// question, resolved).
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<Value>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(64)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `content`, evicting the oldest entry if already at capacity.
    /// A zero-capacity buffer silently drops the append.
    pub fn push(&mut self, content: Value) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(content);
    }

    /// A deep-copy snapshot, oldest to newest.
    pub fn snapshot(&self) -> Vec<Value> {
        self.entries.iter().cloned().collect()
    }
}
